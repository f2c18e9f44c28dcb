/// Failure to bring the model up. Cloned to every request waiting on the
/// same load attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to resolve model source: {0}")]
    Source(String),
    #[error("Failed to read labels: {0}")]
    Labels(String),
    #[error("Model runtime error: {0}")]
    Runtime(String),
    #[error("Model loader task failed: {0}")]
    Join(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model is not loaded")]
    NotReady,
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model produced {actual} scores for {expected} labels")]
    Shape { expected: usize, actual: usize },
    #[error("Model error: {0}")]
    Runtime(String),
    #[error("Inference task failed: {0}")]
    Join(String),
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Runtime(err.to_string())
    }
}

/// Errors surfaced across the service boundary. Every variant is scoped to
/// the request that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid image file: {0}")]
    InvalidImage(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

impl ServiceError {
    /// Short client-facing summary, paired with the detail in responses.
    pub fn summary(&self) -> &'static str {
        match self {
            ServiceError::InvalidImage(_) => "Invalid image file",
            ServiceError::ModelUnavailable(_) => "Model unavailable",
            ServiceError::InferenceFailed(_) => "Inference failed",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ServiceError::InvalidImage(detail)
            | ServiceError::ModelUnavailable(detail)
            | ServiceError::InferenceFailed(detail) => detail,
        }
    }
}
