use chart_sync::api::{ByGraphIndex, MultigraphConfig, MultigraphController, partition_series};
use chart_sync::core::SeriesSpec;
use indexmap::IndexMap;
use proptest::prelude::*;

fn specs(graphs: &[Option<usize>]) -> Vec<SeriesSpec> {
    graphs
        .iter()
        .enumerate()
        .map(|(i, graph)| {
            let spec = SeriesSpec::new(format!("s{i}"));
            match graph {
                Some(graph) => spec.with_graph(*graph),
                None => spec,
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn partition_is_total_disjoint_and_ordered(
        graphs in prop::collection::vec(prop::option::of(0usize..6), 0..24),
        moved in prop::collection::vec((0usize..24, 0usize..6), 0..4)
    ) {
        let series = specs(&graphs);
        let mut assignments = IndexMap::new();
        for (position, group) in moved {
            if position < series.len() {
                assignments.insert(series[position].key.clone(), group);
            }
        }

        let partition = partition_series(&series, &ByGraphIndex, &assignments);

        let mut seen = vec![false; series.len()];
        let mut previous_group = None;
        for group in &partition.groups {
            prop_assert!(!group.members.is_empty());
            if let Some(previous) = previous_group {
                prop_assert!(group.group_index > previous);
            }
            previous_group = Some(group.group_index);
            prop_assert!(group.members.windows(2).all(|pair| pair[0] < pair[1]));
            for &position in &group.members {
                prop_assert!(!seen[position]);
                seen[position] = true;
            }
        }
        prop_assert!(seen.iter().all(|covered| *covered));
        prop_assert_eq!(partition.covered(), series.len());
    }

    #[test]
    fn controller_keeps_one_pool_member_per_group(
        first in prop::collection::vec(prop::option::of(0usize..5), 0..12),
        second in prop::collection::vec(prop::option::of(0usize..5), 0..12)
    ) {
        let controller = MultigraphController::new(MultigraphConfig::default().with_id("prop"))
            .expect("controller");

        for graphs in [&first, &second] {
            controller.set_series(specs(graphs)).expect("set series");

            let groups = controller.multi_series();
            prop_assert_eq!(controller.pool().len(), groups.len());
            prop_assert_eq!(controller.charts().len(), groups.len());
            let total: usize = groups.iter().map(|group| group.series.len()).sum();
            prop_assert_eq!(total, graphs.len());
            for (index, group) in groups.iter().enumerate() {
                prop_assert_eq!(&group.chart_id, &controller.chart_id(index));
                prop_assert!(group.series.iter().all(|s| s.multigrapher_graph_index == index));
            }
        }
    }
}
