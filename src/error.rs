use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    /// A dataset could not be fetched or read. Aborts the whole load.
    #[error("failed to load {dataset} dataset from {source_label}: {reason}")]
    DataLoad {
        dataset: String,
        source_label: String,
        reason: String,
    },
    /// A single user action was rejected; nothing was applied.
    #[error("{0}")]
    Validation(String),
    /// The datasets disagree with each other (dimensions, asset names, cell values).
    #[error("inconsistent datasets: {0}")]
    Configuration(String),
    #[error("weights sum to zero and cannot be normalized")]
    InvalidWeights,
}

impl FrontierError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FrontierError>;
