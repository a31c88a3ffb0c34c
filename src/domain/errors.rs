use thiserror::Error;

#[derive(Debug, Error)]
#[error("validation failed: {0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Admission-time errors returned synchronously to the ingress caller.
/// Everything past admission is recovered inside the pipeline and only
/// surfaces as a terminal status on the message record.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("tenant quota exceeded")]
    QuotaExceeded,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}
