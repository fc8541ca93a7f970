pub mod bounds;
pub mod events;
pub mod series;
pub mod types;

pub use bounds::{BoundCalculator, BoundHistory, SelectionBounds};
pub use events::{EventEmitter, Listener, Subscription};
pub use series::{
    LINE_COLORS, MultigraphSeries, SeriesColor, SeriesSpec, resolve_series_color,
    resolve_series_name,
};
pub use types::ChartId;
