pub mod error;
pub mod handle;
pub mod labels;
pub mod preprocess;
pub mod service;
pub mod source;
#[cfg(feature = "torch")]
pub mod torch;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use error::{InferenceError, LoadError, ServiceError};
pub use handle::ModelHandle;
pub use preprocess::DecodedImage;
pub use service::InferenceService;

/// Top-ranked prediction of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub score: f32,
}

/// A loaded model. Implementations must tolerate concurrent calls, either
/// natively or by serializing forward passes internally.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image: &DecodedImage) -> Result<ClassificationResult, InferenceError>;
}

/// Performs the expensive, blocking model load.
pub trait ModelLoader: Send + Sync {
    fn model_id(&self) -> &str;

    fn load(&self) -> Result<Arc<dyn ImageClassifier>, LoadError>;
}
