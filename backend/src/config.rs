use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_ID: &str = "prithivMLmods/Deep-Fake-Detector-v2-Model";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub version: f32,
    pub model: ModelConfig,
    pub image: ImageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face repo id, or a local directory / TorchScript file.
    pub id: String,
    pub revision: Option<String>,
    /// TorchScript export inside the model directory or repo.
    pub weights: String,
    /// Hugging Face `config.json` carrying `id2label`.
    pub labels_file: String,
    /// Used when the labels file is missing.
    pub labels: Vec<String>,
    pub device: DevicePreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// `[width, height]`.
    pub size: [u32; 2],
    pub channels: u32,
    pub preprocessing: PreprocessingConfig,
    pub normalization: NormalizationConfig,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub resize_method: ResizeMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    Lanczos,
}

impl ResizeMethod {
    pub fn filter(self) -> FilterType {
        match self {
            ResizeMethod::Nearest => FilterType::Nearest,
            ResizeMethod::Bilinear => FilterType::Triangle,
            ResizeMethod::Bicubic => FilterType::CatmullRom,
            ResizeMethod::Gaussian => FilterType::Gaussian,
            ResizeMethod::Lanczos => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub cors_origins: Vec<String>,
    /// Load the model before accepting requests instead of on first use.
    pub eager_load: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            model: ModelConfig::default(),
            image: ImageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_MODEL_ID.to_string(),
            revision: None,
            weights: "model.pt".to_string(),
            labels_file: "config.json".to_string(),
            labels: vec!["Realism".to_string(), "Deepfake".to_string()],
            device: DevicePreference::Auto,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: [224, 224],
            channels: 3,
            preprocessing: PreprocessingConfig::default(),
            normalization: NormalizationConfig::default(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            resize_method: ResizeMethod::Bilinear,
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "https://truthchain-ui.vercel.app".to_string(),
                "https://truth-chain-rho.vercel.app".to_string(),
            ],
            eager_load: false,
        }
    }
}

impl ImageConfig {
    /// Target `(width, height)` of the model input.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.size[0], self.size[1])
    }
}

impl DetectorConfig {
    /// Reads the YAML config, then applies environment overrides.
    ///
    /// The file is `$DETECTOR_CONFIG` when set, otherwise
    /// `config/detector.yaml` at the workspace root. A missing default file
    /// falls back to built-in defaults; a missing explicit file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("DETECTOR_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::warn!(
                        "No config at {}, using built-in defaults",
                        path.display()
                    );
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("MODEL_ID") {
            self.model.id = id;
        }
        if let Some(weights) = lookup("MODEL_WEIGHTS") {
            self.model.weights = weights;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(eager) = lookup("EAGER_LOAD") {
            self.server.eager_load = matches!(eager.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Invalid("model.id must not be empty".into()));
        }
        if self.model.labels.is_empty() {
            return Err(ConfigError::Invalid("model.labels must not be empty".into()));
        }
        if self.image.size.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "image.size must have non-zero width and height, got {:?}",
                self.image.size
            )));
        }
        if self.image.channels != 3 {
            return Err(ConfigError::Invalid(format!(
                "image.channels must be 3 (RGB), got {}",
                self.image.channels
            )));
        }
        if self.image.normalization.std.iter().any(|s| *s == 0.0) {
            return Err(ConfigError::Invalid(
                "image.normalization.std must be non-zero".into(),
            ));
        }
        if self.image.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "image.max_upload_bytes must be positive".into(),
            ));
        }
        if self.server.cors_origins.iter().any(|origin| origin == "*") {
            return Err(ConfigError::Invalid(
                "server.cors_origins is an allow-list; wildcard origins are not accepted".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(manifest_dir) => PathBuf::from(format!("{}/../config/detector.yaml", manifest_dir)),
        Err(_) => PathBuf::from("config/detector.yaml"),
    }
}
