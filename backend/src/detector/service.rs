use shared::{ModelStatus, Verdict};

use super::preprocess::{self, DecodedImage};
use super::{ModelHandle, ServiceError};

/// Turns uploaded bytes into a verdict. Cheap to clone; every clone shares
/// the same model handle.
#[derive(Clone)]
pub struct InferenceService {
    handle: ModelHandle,
    max_upload_bytes: usize,
}

impl InferenceService {
    pub fn new(handle: ModelHandle, max_upload_bytes: usize) -> Self {
        Self {
            handle,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn status(&self) -> ModelStatus {
        self.handle.status()
    }

    /// Loads the model ahead of the first request.
    pub async fn warm_up(&self) -> Result<(), ServiceError> {
        self.handle
            .ensure_loaded()
            .await
            .map(|_| ())
            .map_err(|e| ServiceError::ModelUnavailable(e.to_string()))
    }

    pub async fn classify_image(&self, raw: Vec<u8>) -> Result<Verdict, ServiceError> {
        let image = self.decode(raw).await?;

        self.handle
            .ensure_loaded()
            .await
            .map_err(|e| ServiceError::ModelUnavailable(e.to_string()))?;

        let handle = self.handle.clone();
        let result = tokio::task::spawn_blocking(move || handle.classify(&image))
            .await
            .map_err(|e| ServiceError::InferenceFailed(e.to_string()))?
            .map_err(|e| ServiceError::InferenceFailed(e.to_string()))?;

        log::debug!("Prediction: {} ({:.4})", result.label, result.score);
        Ok(Verdict::from_prediction(result.label, result.score))
    }

    async fn decode(&self, raw: Vec<u8>) -> Result<DecodedImage, ServiceError> {
        let limit = self.max_upload_bytes;
        tokio::task::spawn_blocking(move || preprocess::decode_rgb(&raw, limit))
            .await
            .map_err(|e| ServiceError::InvalidImage(format!("decoder crashed: {}", e)))?
            .map_err(|e| ServiceError::InvalidImage(e.to_string()))
    }
}
