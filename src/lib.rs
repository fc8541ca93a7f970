//! chart-sync: cross-chart state synchronization.
//!
//! Charts expose their view state through [`api::ChartState`]; a
//! [`SyncPool`] links any number of them so bound selections, tooltip
//! positions and y-axis drags follow the chart the user is interacting with.
//! [`MultigraphController`] splits one series list into several stacked
//! sub-charts sharing a pool.
//!
//! Everything is single-threaded (`Rc`/`RefCell`) and event delivery is
//! synchronous.

pub mod api;
pub mod core;
pub mod error;
pub mod interaction;
pub mod telemetry;

pub use api::{ChartState, MultigraphController, SyncMember, SyncPool, SyncPoolConfig};
pub use error::{SyncError, SyncResult};
