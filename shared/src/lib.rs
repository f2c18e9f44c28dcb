use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Label the detector model uses for manipulated images.
pub const DEEPFAKE_LABEL: &str = "Deepfake";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Verdict {
    pub is_fake: bool,
    pub confidence: f32,
    pub label: String,
}

impl Verdict {
    pub fn from_prediction(label: impl Into<String>, score: f32) -> Self {
        let label = label.into();
        Self {
            is_fake: label == DEEPFAKE_LABEL,
            confidence: score,
            label,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RootResponse {
    #[serde(rename = "Hello")]
    pub hello: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelStatus {
    pub state: ModelState,
    pub model_id: String,
    pub loaded_at: Option<DateTime<Utc>>,
    pub load_attempts: u32,
    pub error: Option<String>,
}
