use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};

use super::LoadError;
use crate::config::ModelConfig;

/// Files backing one model, resolved on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub labels: Option<PathBuf>,
}

/// Where `model.id` points.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    LocalDir(PathBuf),
    LocalFile(PathBuf),
    HuggingFace { repo_id: String, revision: String },
}

impl ModelSource {
    pub fn from_config(config: &ModelConfig) -> Result<Self, LoadError> {
        let path = Path::new(&config.id);
        if path.is_dir() {
            return Ok(ModelSource::LocalDir(path.to_path_buf()));
        }
        if path.is_file() {
            return Ok(ModelSource::LocalFile(path.to_path_buf()));
        }
        if looks_like_path(&config.id) {
            return Err(LoadError::Source(format!(
                "model path {} does not exist",
                config.id
            )));
        }
        Ok(ModelSource::HuggingFace {
            repo_id: config.id.clone(),
            revision: config
                .revision
                .clone()
                .unwrap_or_else(|| "main".to_string()),
        })
    }
}

/// Resolves the weights and optional labels file. Hub downloads go through
/// the local Hugging Face cache, so only the first resolve hits the network.
pub fn resolve(config: &ModelConfig) -> Result<ModelFiles, LoadError> {
    match ModelSource::from_config(config)? {
        ModelSource::LocalDir(dir) => {
            let weights = dir.join(&config.weights);
            if !weights.is_file() {
                return Err(LoadError::Source(format!(
                    "weights file {} not found",
                    weights.display()
                )));
            }
            let labels = Some(dir.join(&config.labels_file)).filter(|p| p.is_file());
            Ok(ModelFiles { weights, labels })
        }
        ModelSource::LocalFile(weights) => {
            let labels = weights
                .parent()
                .map(|dir| dir.join(&config.labels_file))
                .filter(|p| p.is_file());
            Ok(ModelFiles { weights, labels })
        }
        ModelSource::HuggingFace { repo_id, revision } => {
            log::info!(
                "Fetching {} from Hugging Face repo {} ({})",
                config.weights,
                repo_id,
                revision
            );
            let api = Api::new().map_err(|e| LoadError::Source(e.to_string()))?;
            let repo = api.repo(Repo::with_revision(repo_id.clone(), RepoType::Model, revision));
            let weights = repo
                .get(&config.weights)
                .map_err(|e| LoadError::Source(format!("{}/{}: {}", repo_id, config.weights, e)))?;
            let labels = match repo.get(&config.labels_file) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!(
                        "No {} in {}, falling back to configured labels: {}",
                        config.labels_file,
                        repo_id,
                        e
                    );
                    None
                }
            };
            Ok(ModelFiles { weights, labels })
        }
    }
}

fn looks_like_path(id: &str) -> bool {
    id.starts_with('/')
        || id.starts_with('.')
        || id.starts_with('~')
        || id.contains('\\')
}
