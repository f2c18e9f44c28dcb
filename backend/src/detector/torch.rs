use std::sync::{Arc, Mutex};
use tch::{CModule, Device, IValue, Kind, Tensor};

use super::labels::LabelTable;
use super::preprocess::{DecodedImage, ImageTransform};
use super::source;
use super::{ClassificationResult, ImageClassifier, InferenceError, LoadError, ModelLoader};
use crate::config::{DevicePreference, ModelConfig};

/// Loads a TorchScript export of the detector.
pub struct TorchLoader {
    config: ModelConfig,
    transform: ImageTransform,
}

impl TorchLoader {
    pub fn new(config: ModelConfig, transform: ImageTransform) -> Self {
        Self { config, transform }
    }

    fn device(&self) -> Device {
        match self.config.device {
            DevicePreference::Auto => Device::cuda_if_available(),
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Cuda => Device::Cuda(0),
        }
    }

    fn labels(&self, files: &source::ModelFiles) -> Result<LabelTable, LoadError> {
        let labels = match &files.labels {
            Some(path) => match LabelTable::from_hf_config(path) {
                Ok(labels) => labels,
                Err(e) => {
                    log::warn!("Ignoring {}: {}", path.display(), e);
                    LabelTable::new(self.config.labels.clone())
                }
            },
            None => LabelTable::new(self.config.labels.clone()),
        };
        if labels.is_empty() {
            return Err(LoadError::Labels("model has no labels".into()));
        }
        Ok(labels)
    }
}

impl ModelLoader for TorchLoader {
    fn model_id(&self) -> &str {
        &self.config.id
    }

    fn load(&self) -> Result<Arc<dyn ImageClassifier>, LoadError> {
        let files = source::resolve(&self.config)?;
        let labels = self.labels(&files)?;
        let device = self.device();
        log::info!(
            "Loading {} on {:?} with labels {:?}",
            files.weights.display(),
            device,
            labels.labels()
        );

        let mut module = CModule::load_on_device(&files.weights, device)
            .map_err(|e| LoadError::Runtime(e.to_string()))?;
        module.set_eval();

        Ok(Arc::new(TorchClassifier {
            module: Mutex::new(module),
            device,
            labels,
            transform: self.transform.clone(),
        }))
    }
}

/// Forward passes are serialized on the module mutex.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    labels: LabelTable,
    transform: ImageTransform,
}

impl ImageClassifier for TorchClassifier {
    fn classify(&self, image: &DecodedImage) -> Result<ClassificationResult, InferenceError> {
        let input = self.transform.apply(image);
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocessing("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_slice(data)
            .view(shape.as_slice())
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Runtime("model lock poisoned".into()))?;
            tch::no_grad(|| module.forward_is(&[IValue::Tensor(tensor)]))?
        };

        let logits = first_tensor(output)?
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let logits = Vec::<f32>::try_from(&logits)?;
        self.labels.top1(&logits)
    }
}

/// Traced Hugging Face models return either the logits tensor or a tuple
/// whose first element is the logits.
fn first_tensor(output: IValue) -> Result<Tensor, InferenceError> {
    match output {
        IValue::Tensor(tensor) => Ok(tensor),
        IValue::Tuple(values) | IValue::GenericList(values) => values
            .into_iter()
            .find_map(|value| match value {
                IValue::Tensor(tensor) => Some(tensor),
                _ => None,
            })
            .ok_or_else(|| InferenceError::Runtime("model output holds no tensor".into())),
        other => Err(InferenceError::Runtime(format!(
            "unexpected model output {:?}",
            other
        ))),
    }
}
