mod chart_state;
mod multigraph_controller;
mod multigraph_partition;
mod sync_diagnostics;
mod sync_member;
mod sync_pool;

pub use chart_state::{
    ChartState, ChartStateConfig, SeriesTooltipResolver, TooltipQuery, TooltipResolver,
};
pub use multigraph_controller::{
    GraphCountChange, MoveTarget, MultiSeriesChange, MultigraphConfig, MultigraphController,
    MultigraphSnapshot, SeriesGroup, SeriesMove,
};
pub use multigraph_partition::{
    ByGraphIndex, OnePerSeries, Partition, PartitionGroup, PartitionPolicy, partition_series,
};
pub use sync_diagnostics::{SyncDiagnostics, SyncDiagnosticsSnapshot};
pub use sync_member::SyncMember;
pub use sync_pool::{SyncPool, SyncPoolConfig};
