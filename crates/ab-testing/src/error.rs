use {crate::experiment::ExperimentStatus, thiserror::Error};

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("experiment {0} not found")]
    NotFound(String),
    #[error("invalid status transition {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: ExperimentStatus,
        to: ExperimentStatus,
    },
    #[error("traffic split {0} outside [0, 1]")]
    InvalidTrafficSplit(f64),
    #[error("framework stopped")]
    Stopped,
    #[error(transparent)]
    Store(#[from] kv_store::StorageError),
}
