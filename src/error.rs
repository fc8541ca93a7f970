use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("chart id `{chart_id}` is already registered by a different state object")]
    DuplicateChartId { chart_id: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid series move: {0}")]
    InvalidMove(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
