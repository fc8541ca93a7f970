use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::core::{ChartId, EventEmitter, MultigraphSeries, SeriesSpec, Subscription};
use crate::error::{SyncError, SyncResult};
use crate::interaction::{DragDrop, TooltipSyncMode};

use super::multigraph_partition::{ByGraphIndex, PartitionPolicy, partition_series};
use super::{ChartState, ChartStateConfig, SyncMember, SyncPool, SyncPoolConfig};

const CHART_ID_PREFIX: &str = "multigrapher-";

/// Bootstrap configuration of a [`MultigraphController`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultigraphConfig {
    /// Multigrapher id used in chart ids. Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_sync_bounds")]
    pub sync_bounds: bool,
    #[serde(default)]
    pub sync_tooltips: TooltipSyncMode,
    #[serde(default)]
    pub chart: ChartStateConfig,
}

fn default_sync_bounds() -> bool {
    true
}

impl Default for MultigraphConfig {
    fn default() -> Self {
        Self {
            id: None,
            sync_bounds: true,
            sync_tooltips: TooltipSyncMode::Always,
            chart: ChartStateConfig::default(),
        }
    }
}

impl MultigraphConfig {
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_sync_bounds(mut self, sync_bounds: bool) -> Self {
        self.sync_bounds = sync_bounds;
        self
    }

    #[must_use]
    pub fn with_sync_tooltips(mut self, sync_tooltips: TooltipSyncMode) -> Self {
        self.sync_tooltips = sync_tooltips;
        self
    }

    #[must_use]
    pub fn with_chart_config(mut self, chart: ChartStateConfig) -> Self {
        self.chart = chart;
        self
    }

    /// Pool settings for sub-charts. Drag state is always linked.
    #[must_use]
    pub fn pool_config(&self) -> SyncPoolConfig {
        SyncPoolConfig::default()
            .with_sync_bounds(self.sync_bounds)
            .with_sync_tooltips(self.sync_tooltips)
            .with_sync_drag_state(true)
    }

    /// Serializes config to pretty JSON for debug/config files.
    pub fn to_json_pretty(&self) -> SyncResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SyncError::InvalidConfig(format!("failed to serialize multigraph config: {e}"))
        })
    }

    /// Deserializes and validates config from JSON.
    pub fn from_json_str(input: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|e| {
            SyncError::InvalidConfig(format!("failed to parse multigraph config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        let Some(id) = &self.id else {
            return Ok(());
        };
        if id.is_empty() {
            return Err(SyncError::InvalidConfig(
                "multigrapher id must not be empty".to_owned(),
            ));
        }
        if !id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(SyncError::InvalidConfig(format!(
                "multigrapher id `{id}` may only contain ASCII letters, digits and `_`"
            )));
        }
        Ok(())
    }
}

/// Series shown by one sub-chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesGroup {
    pub chart_id: ChartId,
    pub series: Vec<MultigraphSeries>,
}

/// Payload of `multi_series_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSeriesChange {
    pub groups: Vec<SeriesGroup>,
}

/// Payload of `graph_count_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCountChange {
    pub graph_count: usize,
    pub previous: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveTarget {
    /// Existing sub-chart by position.
    Graph(usize),
    /// New (or already empty) sub-chart above the first one.
    Top,
    /// New (or already empty) sub-chart below the last one.
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesMove {
    pub series_key: String,
    pub target: MoveTarget,
    pub axis_index: Option<usize>,
}

/// Serializable view of a controller for debugging panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultigraphSnapshot {
    pub id: String,
    pub graph_count: usize,
    pub series_count: usize,
    pub dragging_y: bool,
    pub chart_ids: Vec<ChartId>,
}

impl MultigraphSnapshot {
    pub fn to_json_pretty(&self) -> SyncResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SyncError::InvalidData(format!("failed to serialize multigraph snapshot: {e}"))
        })
    }
}

struct ManagedChart {
    state: Rc<ChartState>,
    _subscriptions: SmallVec<[Subscription; 2]>,
}

struct MultigraphInner {
    series: Vec<SeriesSpec>,
    series_indices: IndexMap<String, usize>,
    next_series_index: usize,
    graph_assignments: IndexMap<String, usize>,
    axis_assignments: IndexMap<String, usize>,
    groups: Vec<SeriesGroup>,
    charts: Vec<ManagedChart>,
    dragging_y: bool,
    disposed: bool,
}

impl MultigraphInner {
    fn input(&self) -> RegroupInput {
        RegroupInput {
            series: self.series.clone(),
            graph_assignments: self.graph_assignments.clone(),
            axis_assignments: self.axis_assignments.clone(),
        }
    }

    fn restore(&mut self, input: RegroupInput) {
        self.series = input.series;
        self.graph_assignments = input.graph_assignments;
        self.axis_assignments = input.axis_assignments;
    }
}

/// Partition inputs as they were before a rejected change.
struct RegroupInput {
    series: Vec<SeriesSpec>,
    graph_assignments: IndexMap<String, usize>,
    axis_assignments: IndexMap<String, usize>,
}

struct RegroupOutcome {
    change: MultiSeriesChange,
    previous_count: usize,
    updates: Vec<(Rc<ChartState>, Vec<MultigraphSeries>)>,
    retired: Vec<ManagedChart>,
}

/// Registration failure while planning. `abandoned` charts were registered
/// in the same pass but never became managed.
struct RegroupFailure {
    error: SyncError,
    abandoned: Vec<ManagedChart>,
}

struct MultigraphShared {
    id: String,
    chart_config: ChartStateConfig,
    pool: SyncPool,
    policy: Box<dyn PartitionPolicy>,
    inner: RefCell<MultigraphInner>,
    multi_series_changed: EventEmitter<MultiSeriesChange>,
    graph_count_changed: EventEmitter<GraphCountChange>,
    dragging_y_changed: EventEmitter<bool>,
}

impl MultigraphShared {
    fn chart_id(&self, index: usize) -> ChartId {
        ChartId::new(format!("{CHART_ID_PREFIX}{}-{index}", self.id))
    }

    fn parse_target(&self, target: &ChartId) -> Option<MoveTarget> {
        let rest = target.as_str().strip_prefix(CHART_ID_PREFIX)?;
        let (owner, slot) = rest.split_once('-')?;
        if owner != self.id {
            return None;
        }
        match slot {
            "top" => Some(MoveTarget::Top),
            "bottom" => Some(MoveTarget::Bottom),
            index => index.parse().ok().map(MoveTarget::Graph),
        }
    }

    /// Re-partitions and reconciles the sub-charts. On failure the groups and
    /// charts are unchanged and `previous` is restored as the input.
    fn regroup(self: &Rc<Self>, previous: RegroupInput) -> SyncResult<()> {
        let outcome = match self.plan_regroup() {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Ok(()),
            Err(failure) => {
                self.inner.borrow_mut().restore(previous);
                for managed in failure.abandoned {
                    self.retire(managed);
                }
                return Err(failure.error);
            }
        };

        for (state, series) in outcome.updates {
            state.set_series(series);
        }
        for managed in outcome.retired {
            self.retire(managed);
        }

        let graph_count = outcome.change.groups.len();
        debug!(
            multigrapher_id = %self.id,
            graph_count,
            previous = outcome.previous_count,
            "multi series changed"
        );
        self.multi_series_changed.emit(&outcome.change);
        if graph_count != outcome.previous_count {
            self.graph_count_changed.emit(&GraphCountChange {
                graph_count,
                previous: outcome.previous_count,
            });
        }
        Ok(())
    }

    fn retire(&self, managed: ManagedChart) {
        let state = Rc::clone(&managed.state);
        self.pool.remove(state.chart_id());
        drop(managed);
        state.dispose();
    }

    fn plan_regroup(self: &Rc<Self>) -> Result<Option<RegroupOutcome>, RegroupFailure> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.disposed {
            return Ok(None);
        }

        // Indices follow first appearance and are never reused for another key.
        for spec in &inner.series {
            if !inner.series_indices.contains_key(&spec.key) {
                inner
                    .series_indices
                    .insert(spec.key.clone(), inner.next_series_index);
                inner.next_series_index += 1;
            }
        }

        let partition =
            partition_series(&inner.series, self.policy.as_ref(), &inner.graph_assignments);

        let mut groups = Vec::with_capacity(partition.group_count());
        for (graph_index, group) in partition.groups.iter().enumerate() {
            let mut series = Vec::with_capacity(group.members.len());
            for &position in &group.members {
                let spec = &inner.series[position];
                let series_index = inner
                    .series_indices
                    .get(&spec.key)
                    .copied()
                    .unwrap_or(position);
                let axis_index = inner.axis_assignments.get(&spec.key).copied();
                series.push(MultigraphSeries::decorate(
                    spec,
                    series_index,
                    graph_index,
                    axis_index,
                ));
            }
            groups.push(SeriesGroup {
                chart_id: self.chart_id(graph_index),
                series,
            });
        }

        if groups == inner.groups {
            return Ok(None);
        }

        // Registration emits nothing, so it is safe under the borrow.
        let mut added = Vec::new();
        for group in groups.iter().skip(inner.charts.len()) {
            let managed = self.create_chart(group.chart_id.clone());
            if let Err(error) = self.pool.add(&managed.state) {
                warn!(
                    multigrapher_id = %self.id,
                    chart_id = %group.chart_id,
                    error = %error,
                    "failed to register sub-chart with sync pool"
                );
                // Not registered anywhere: dropping it releases it.
                drop(managed);
                return Err(RegroupFailure {
                    error,
                    abandoned: added,
                });
            }
            added.push(managed);
        }
        inner.charts.extend(added);

        let previous_count = inner.groups.len();
        let updates = groups
            .iter()
            .zip(&inner.charts)
            .map(|(group, managed)| (Rc::clone(&managed.state), group.series.clone()))
            .collect();
        let retired = if inner.charts.len() > groups.len() {
            inner.charts.split_off(groups.len())
        } else {
            Vec::new()
        };

        inner.groups = groups.clone();
        Ok(Some(RegroupOutcome {
            change: MultiSeriesChange { groups },
            previous_count,
            updates,
            retired,
        }))
    }

    fn create_chart(self: &Rc<Self>, chart_id: ChartId) -> ManagedChart {
        trace!(multigrapher_id = %self.id, chart_id = %chart_id, "create sub-chart state");
        let state = ChartState::new(chart_id, self.chart_config.clone());
        let mut subscriptions = SmallVec::new();

        let controller: Weak<Self> = Rc::downgrade(self);
        subscriptions.push(state.on_dragging_y_changed(Box::new(move |dragging_y: &bool| {
            if let Some(controller) = controller.upgrade() {
                controller.on_member_dragging_y(*dragging_y);
            }
        })));

        let controller: Weak<Self> = Rc::downgrade(self);
        let source = state.chart_id().clone();
        subscriptions.push(state.on_dragging_y_finalized(move |drag_drop: &DragDrop| {
            if let Some(controller) = controller.upgrade() {
                controller.on_member_drop(&source, drag_drop);
            }
        }));

        ManagedChart {
            state,
            _subscriptions: subscriptions,
        }
    }

    fn on_member_dragging_y(&self, dragging_y: bool) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.dragging_y == dragging_y {
                return;
            }
            inner.dragging_y = dragging_y;
        }
        self.dragging_y_changed.emit(&dragging_y);
    }

    fn on_member_drop(self: &Rc<Self>, source: &ChartId, drag_drop: &DragDrop) {
        if drag_drop.target == *source {
            // The chart already moved the series to its local axis.
            if let Some(axis_index) = drag_drop.axis_index {
                self.remember_local_axis(&drag_drop.series_key, axis_index);
            }
            return;
        }
        let Some(target) = self.parse_target(&drag_drop.target) else {
            trace!(
                multigrapher_id = %self.id,
                target = %drag_drop.target,
                "drop target outside this multigrapher"
            );
            return;
        };

        let request = SeriesMove {
            series_key: drag_drop.series_key.clone(),
            target,
            axis_index: drag_drop.axis_index,
        };
        if let Err(err) = self.move_series(request) {
            warn!(
                multigrapher_id = %self.id,
                error = %err,
                "ignoring series drop"
            );
        }
    }

    fn remember_local_axis(&self, series_key: &str, axis_index: usize) {
        let mut inner = self.inner.borrow_mut();
        let mut known = false;
        for series in inner
            .groups
            .iter_mut()
            .flat_map(|group| group.series.iter_mut())
            .filter(|series| series.key == series_key)
        {
            series.axis_index = Some(axis_index);
            known = true;
        }
        if known {
            inner
                .axis_assignments
                .insert(series_key.to_owned(), axis_index);
        }
    }

    fn move_series(self: &Rc<Self>, request: SeriesMove) -> SyncResult<()> {
        let previous = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return Err(SyncError::InvalidMove(
                    "multigraph controller is disposed".to_owned(),
                ));
            }
            if !inner
                .groups
                .iter()
                .any(|group| group.series.iter().any(|s| s.key == request.series_key))
            {
                return Err(SyncError::InvalidMove(format!(
                    "unknown series `{}`",
                    request.series_key
                )));
            }

            let previous = inner.input();
            let graph_count = inner.groups.len();
            let mut assignments: IndexMap<String, usize> = IndexMap::new();
            for (graph_index, group) in inner.groups.iter().enumerate() {
                for series in &group.series {
                    assignments.insert(series.key.clone(), graph_index);
                }
            }

            let target_index = match request.target {
                MoveTarget::Graph(index) if index < graph_count => index,
                MoveTarget::Graph(index) => {
                    return Err(SyncError::InvalidMove(format!(
                        "graph index {index} out of range (graph count {graph_count})"
                    )));
                }
                MoveTarget::Top => {
                    for graph_index in assignments.values_mut() {
                        *graph_index += 1;
                    }
                    0
                }
                MoveTarget::Bottom => graph_count,
            };
            assignments.insert(request.series_key.clone(), target_index);
            inner.graph_assignments = assignments;

            match request.axis_index {
                Some(axis_index) => {
                    inner
                        .axis_assignments
                        .insert(request.series_key.clone(), axis_index);
                }
                None => {
                    inner.axis_assignments.shift_remove(&request.series_key);
                }
            }
            previous
        };

        debug!(
            multigrapher_id = %self.id,
            series_key = %request.series_key,
            target = ?request.target,
            "move series"
        );
        self.regroup(previous)
    }

    fn dispose(&self) {
        let charts = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.groups.clear();
            std::mem::take(&mut inner.charts)
        };

        debug!(multigrapher_id = %self.id, charts = charts.len(), "dispose multigraph controller");
        for managed in charts {
            let state = Rc::clone(&managed.state);
            self.pool.remove(state.chart_id());
            drop(managed);
            state.dispose();
        }

        self.multi_series_changed.clear();
        self.graph_count_changed.clear();
        self.dragging_y_changed.clear();
    }
}

/// Splits a flat series list into sub-charts and manages one [`ChartState`]
/// per sub-chart, all registered with one shared [`SyncPool`].
///
/// Sub-charts are identified by position (`multigrapher-{id}-{index}`); when the
/// partition changes, charts at surviving positions are reused so user-driven
/// state such as bounds survives, and charts past the new end are removed from
/// the pool and disposed. Dropping the controller disposes every sub-chart.
pub struct MultigraphController {
    shared: Rc<MultigraphShared>,
}

impl MultigraphController {
    /// Creates a controller with its own pool built from `config`.
    pub fn new(config: MultigraphConfig) -> SyncResult<Self> {
        let pool = SyncPool::new(config.pool_config());
        Self::with_pool(config, pool)
    }

    pub fn with_pool(config: MultigraphConfig, pool: SyncPool) -> SyncResult<Self> {
        Self::with_policy(config, pool, ByGraphIndex)
    }

    pub fn with_policy(
        config: MultigraphConfig,
        pool: SyncPool,
        policy: impl PartitionPolicy + 'static,
    ) -> SyncResult<Self> {
        config.validate()?;
        let id = config.id.clone().unwrap_or_else(generate_multigrapher_id);
        debug!(multigrapher_id = %id, "create multigraph controller");

        Ok(Self {
            shared: Rc::new(MultigraphShared {
                id,
                chart_config: config.chart,
                pool,
                policy: Box::new(policy),
                inner: RefCell::new(MultigraphInner {
                    series: Vec::new(),
                    series_indices: IndexMap::new(),
                    next_series_index: 0,
                    graph_assignments: IndexMap::new(),
                    axis_assignments: IndexMap::new(),
                    groups: Vec::new(),
                    charts: Vec::new(),
                    dragging_y: false,
                    disposed: false,
                }),
                multi_series_changed: EventEmitter::new(),
                graph_count_changed: EventEmitter::new(),
                dragging_y_changed: EventEmitter::new(),
            }),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    #[must_use]
    pub fn pool(&self) -> &SyncPool {
        &self.shared.pool
    }

    /// Replaces the input series list and re-partitions.
    ///
    /// An identical list is a no-op. Keys must be unique. Fails with
    /// [`SyncError::DuplicateChartId`] when a new sub-chart id is already held
    /// in the pool, leaving the current layout untouched.
    pub fn set_series(&self, series: Vec<SeriesSpec>) -> SyncResult<()> {
        let previous = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.disposed {
                return Err(SyncError::InvalidData(
                    "multigraph controller is disposed".to_owned(),
                ));
            }
            if inner.series == series {
                return Ok(());
            }

            let mut seen = HashSet::with_capacity(series.len());
            if let Some(duplicate) = series.iter().find(|spec| !seen.insert(spec.key.as_str())) {
                warn!(
                    multigrapher_id = %self.shared.id,
                    series_key = %duplicate.key,
                    "rejecting series list with duplicate key"
                );
                return Err(SyncError::InvalidData(format!(
                    "duplicate series key `{}`",
                    duplicate.key
                )));
            }

            let previous = inner.input();
            inner
                .graph_assignments
                .retain(|key, _| seen.contains(key.as_str()));
            inner
                .axis_assignments
                .retain(|key, _| seen.contains(key.as_str()));
            inner.series = series;
            previous
        };

        self.shared.regroup(previous)
    }

    /// Moves a series to another sub-chart. The placement sticks across later
    /// [`set_series`](Self::set_series) calls while the series stays present.
    pub fn move_series(&self, request: SeriesMove) -> SyncResult<()> {
        self.shared.move_series(request)
    }

    /// Current non-empty groups, in display order.
    #[must_use]
    pub fn multi_series(&self) -> Vec<SeriesGroup> {
        self.shared.inner.borrow().groups.clone()
    }

    #[must_use]
    pub fn graph_count(&self) -> usize {
        self.shared.inner.borrow().groups.len()
    }

    #[must_use]
    pub fn dragging_y(&self) -> bool {
        self.shared.inner.borrow().dragging_y
    }

    #[must_use]
    pub fn charts(&self) -> Vec<Rc<ChartState>> {
        self.shared
            .inner
            .borrow()
            .charts
            .iter()
            .map(|managed| Rc::clone(&managed.state))
            .collect()
    }

    #[must_use]
    pub fn chart(&self, index: usize) -> Option<Rc<ChartState>> {
        self.shared
            .inner
            .borrow()
            .charts
            .get(index)
            .map(|managed| Rc::clone(&managed.state))
    }

    #[must_use]
    pub fn chart_id(&self, index: usize) -> ChartId {
        self.shared.chart_id(index)
    }

    /// Drop-zone id that creates a sub-chart above the first one.
    #[must_use]
    pub fn top_drop_target(&self) -> ChartId {
        ChartId::new(format!("{CHART_ID_PREFIX}{}-top", self.shared.id))
    }

    /// Drop-zone id that creates a sub-chart below the last one.
    #[must_use]
    pub fn bottom_drop_target(&self) -> ChartId {
        ChartId::new(format!("{CHART_ID_PREFIX}{}-bottom", self.shared.id))
    }

    #[must_use]
    pub fn snapshot(&self) -> MultigraphSnapshot {
        let inner = self.shared.inner.borrow();
        MultigraphSnapshot {
            id: self.shared.id.clone(),
            graph_count: inner.groups.len(),
            series_count: inner.series.len(),
            dragging_y: inner.dragging_y,
            chart_ids: inner
                .charts
                .iter()
                .map(|managed| managed.state.chart_id().clone())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.inner.borrow().disposed
    }

    pub fn on_multi_series_changed(
        &self,
        listener: impl Fn(&MultiSeriesChange) + 'static,
    ) -> Subscription {
        self.shared.multi_series_changed.subscribe(listener)
    }

    pub fn on_graph_count_changed(
        &self,
        listener: impl Fn(&GraphCountChange) + 'static,
    ) -> Subscription {
        self.shared.graph_count_changed.subscribe(listener)
    }

    /// Aggregate drag flag: fires when any sub-chart starts or the last one
    /// ends a y-axis drag.
    pub fn on_dragging_y_changed(&self, listener: impl Fn(&bool) + 'static) -> Subscription {
        self.shared.dragging_y_changed.subscribe(listener)
    }

    /// Removes every sub-chart from the pool and disposes it. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }
}

impl Drop for MultigraphController {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl fmt::Debug for MultigraphController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultigraphController")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn generate_multigrapher_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
