use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::{ClassificationResult, InferenceError, LoadError};

#[derive(Deserialize)]
struct HfModelConfig {
    id2label: Option<HashMap<String, String>>,
}

/// Class index to label name, in model output order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Reads `id2label` from a Hugging Face `config.json`. Ids must cover
    /// `0..n` exactly.
    pub fn from_hf_config(path: &Path) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Labels(format!("{}: {}", path.display(), e)))?;
        Self::from_hf_json(&raw)
    }

    pub fn from_hf_json(raw: &str) -> Result<Self, LoadError> {
        let config: HfModelConfig =
            serde_json::from_str(raw).map_err(|e| LoadError::Labels(e.to_string()))?;
        let id2label = config
            .id2label
            .filter(|map| !map.is_empty())
            .ok_or_else(|| LoadError::Labels("config has no id2label table".into()))?;

        let mut indexed = id2label
            .into_iter()
            .map(|(id, label)| {
                id.parse::<usize>()
                    .map(|idx| (idx, label))
                    .map_err(|_| LoadError::Labels(format!("non-numeric label id {:?}", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indexed.sort_by_key(|(idx, _)| *idx);

        if indexed.iter().enumerate().any(|(pos, (idx, _))| pos != *idx) {
            return Err(LoadError::Labels(
                "label ids are not contiguous from 0".into(),
            ));
        }
        Ok(Self::new(indexed.into_iter().map(|(_, label)| label).collect()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Softmax over raw logits, then the highest-scoring label.
    pub fn top1(&self, logits: &[f32]) -> Result<ClassificationResult, InferenceError> {
        if logits.is_empty() || logits.len() != self.labels.len() {
            return Err(InferenceError::Shape {
                expected: self.labels.len(),
                actual: logits.len(),
            });
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::Runtime("model produced non-finite logits".into()));
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().sum();

        let (best, best_exp) = exps
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (idx, &e)| {
                if e > acc.1 { (idx, e) } else { acc }
            });

        Ok(ClassificationResult {
            label: self.labels[best].clone(),
            score: (best_exp / sum).clamp(0.0, 1.0),
        })
    }
}
