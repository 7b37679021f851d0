//! Load-once emotion model
//!
//! An [`EmotionModel`] bundles the acoustic network, the class index -> raw
//! label table and the preprocessing recipe. It is built once at startup,
//! never mutated, and shared across requests behind an `Arc`.

use crate::inference::preprocess::{FeatureExtractor, FeatureTensor, PreprocessorConfig};
use crate::inference::wav2vec2::{Wav2Vec2Config, Wav2Vec2ForSequenceClassification};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";
pub const SAFETENSORS_FILE: &str = "model.safetensors";
pub const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Model loading failure (fatal at startup)
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Incompatible model configuration: {0}")]
    IncompatibleConfig(String),

    #[error("Invalid label table: {0}")]
    Labels(String),

    #[error("Unsupported device '{0}'")]
    Device(String),

    #[error("Failed to load weights: {0}")]
    Weights(String),
}

/// A network that turns a feature tensor into one logit per class
///
/// Implementations must be usable from many threads at once through `&self`.
pub trait AcousticNetwork: Send + Sync {
    /// Number of output classes
    fn num_labels(&self) -> usize;

    /// Shortest input (in samples) the network accepts
    fn min_input_len(&self) -> usize;

    /// Raw logits, one per class
    fn forward(&self, features: &FeatureTensor) -> candle_core::Result<Vec<f32>>;
}

/// Class index -> raw label as shipped with the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable(Vec<String>);

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    /// Build from a `{"0": "angry", "1": "calm", ...}` map.
    ///
    /// Indices must cover `0..n` exactly.
    pub fn from_id2label(id2label: &BTreeMap<String, String>) -> Result<Self, ModelLoadError> {
        if id2label.is_empty() {
            return Err(ModelLoadError::Labels("id2label is empty".to_string()));
        }

        let mut indexed = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| ModelLoadError::Labels(format!("non-numeric class index '{}'", key)))?;
            indexed.push((index, label.clone()));
        }
        indexed.sort_by_key(|(index, _)| *index);

        for (expected, (index, _)) in indexed.iter().enumerate() {
            if *index != expected {
                return Err(ModelLoadError::Labels(format!(
                    "class indices are not contiguous (expected {}, found {})",
                    expected, index
                )));
            }
        }

        Ok(Self(indexed.into_iter().map(|(_, label)| label).collect()))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Network + labels + preprocessing recipe
pub struct EmotionModel {
    name: String,
    network: Box<dyn AcousticNetwork>,
    labels: LabelTable,
    extractor: FeatureExtractor,
}

impl std::fmt::Debug for EmotionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionModel")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("preprocessing", self.extractor.recipe())
            .finish_non_exhaustive()
    }
}

impl EmotionModel {
    /// Assemble a model from already-built parts.
    ///
    /// The recipe's `min_length` is raised to the network's minimum input so
    /// short clips are padded rather than rejected by the forward pass.
    pub fn from_parts(
        name: impl Into<String>,
        network: Box<dyn AcousticNetwork>,
        labels: LabelTable,
        mut preprocessing: PreprocessorConfig,
    ) -> Result<Self, ModelLoadError> {
        if labels.len() != network.num_labels() {
            return Err(ModelLoadError::Labels(format!(
                "{} labels for a network with {} outputs",
                labels.len(),
                network.num_labels()
            )));
        }

        preprocessing.raise_min_length(network.min_input_len());

        Ok(Self {
            name: name.into(),
            network,
            labels,
            extractor: FeatureExtractor::new(preprocessing),
        })
    }

    /// Load a wav2vec2 sequence classifier from a pretrained artifact
    /// directory (`config.json`, `preprocessor_config.json`, and
    /// `model.safetensors` or `pytorch_model.bin`).
    pub fn load(dir: &Path, name: &str, device: &Device) -> Result<Self, ModelLoadError> {
        let config: Wav2Vec2Config = read_json(&dir.join(CONFIG_FILE))?;
        config
            .validate()
            .map_err(ModelLoadError::IncompatibleConfig)?;

        let labels = LabelTable::from_id2label(&config.id2label)?;
        let preprocessing: PreprocessorConfig = read_json(&dir.join(PREPROCESSOR_CONFIG_FILE))?;

        let vb = weights_var_builder(dir, device)?;
        let network = Wav2Vec2ForSequenceClassification::load(&config, labels.len(), vb)
            .map_err(|e| ModelLoadError::Weights(e.to_string()))?;

        info!(
            model = name,
            hidden_size = config.hidden_size,
            layers = config.num_hidden_layers,
            labels = labels.len(),
            stable_layer_norm = config.do_stable_layer_norm,
            receptive_field = config.receptive_field(),
            ?device,
            "Emotion model loaded"
        );

        Self::from_parts(name, Box::new(network), labels, preprocessing)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn preprocessing(&self) -> &PreprocessorConfig {
        self.extractor.recipe()
    }

    pub fn feature_extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub(crate) fn network(&self) -> &dyn AcousticNetwork {
        self.network.as_ref()
    }
}

/// Parse a device name: `cpu`, `cuda` or `cuda:<ordinal>`
pub fn parse_device(name: &str) -> Result<Device, ModelLoadError> {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0).map_err(|e| ModelLoadError::Device(format!("cuda: {}", e))),
        other => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
            Some(Ok(ordinal)) => Device::new_cuda(ordinal)
                .map_err(|e| ModelLoadError::Device(format!("{}: {}", other, e))),
            _ => Err(ModelLoadError::Device(other.to_string())),
        },
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::MissingFile(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ModelLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn weights_var_builder(dir: &Path, device: &Device) -> Result<VarBuilder<'static>, ModelLoadError> {
    let safetensors = dir.join(SAFETENSORS_FILE);
    if safetensors.exists() {
        let data = std::fs::read(&safetensors).map_err(|source| ModelLoadError::Io {
            path: safetensors.clone(),
            source,
        })?;
        return VarBuilder::from_buffered_safetensors(data, DType::F32, device)
            .map_err(|e| ModelLoadError::Weights(format!("{}: {}", safetensors.display(), e)));
    }

    let pytorch = dir.join(PYTORCH_FILE);
    if pytorch.exists() {
        return VarBuilder::from_pth(&pytorch, DType::F32, device)
            .map_err(|e| ModelLoadError::Weights(format!("{}: {}", pytorch.display(), e)));
    }

    Err(ModelLoadError::MissingFile(safetensors))
}
