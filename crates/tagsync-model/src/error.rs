use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid tag key: {0} (expected: namespace/stream:tag)")]
    InvalidTagKey(String),

    #[error("unknown enqueue reason: {0}")]
    UnknownReason(String),

    #[error("unknown jitter strategy: {0}")]
    UnknownJitter(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
