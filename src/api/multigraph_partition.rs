use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::core::SeriesSpec;

/// Picks the sub-chart group a series belongs to.
///
/// Groups are ordered by ascending index; the numeric values only need to be
/// comparable, not contiguous.
pub trait PartitionPolicy {
    fn group_index(&self, series: &SeriesSpec, position: usize) -> usize;
}

/// Groups series by their explicit `graph` index, `0` when absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByGraphIndex;

impl PartitionPolicy for ByGraphIndex {
    fn group_index(&self, series: &SeriesSpec, _position: usize) -> usize {
        series.graph.unwrap_or(0)
    }
}

/// One sub-chart per series, in input order.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnePerSeries;

impl PartitionPolicy for OnePerSeries {
    fn group_index(&self, _series: &SeriesSpec, position: usize) -> usize {
        position
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionGroup {
    pub group_index: usize,
    /// Positions into the partitioned input, ascending.
    pub members: Vec<usize>,
}

/// Total, disjoint, order-preserving split of a series list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub groups: Vec<PartitionGroup>,
}

impl Partition {
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of input positions covered, counting repeats.
    #[must_use]
    pub fn covered(&self) -> usize {
        self.groups.iter().map(|group| group.members.len()).sum()
    }
}

/// Splits `series` into groups.
///
/// `assignments` (series key to group index) wins over `policy`; it carries
/// placements made by moving series between sub-charts. Empty groups are never
/// produced.
#[must_use]
pub fn partition_series(
    series: &[SeriesSpec],
    policy: &dyn PartitionPolicy,
    assignments: &IndexMap<String, usize>,
) -> Partition {
    let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (position, spec) in series.iter().enumerate() {
        let group_index = assignments
            .get(&spec.key)
            .copied()
            .unwrap_or_else(|| policy.group_index(spec, position));
        grouped.entry(group_index).or_default().push(position);
    }

    let partition = Partition {
        groups: grouped
            .into_iter()
            .map(|(group_index, members)| PartitionGroup {
                group_index,
                members,
            })
            .collect(),
    };
    debug_assert_eq!(partition.covered(), series.len());
    partition
}
