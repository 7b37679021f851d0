//! Feature extraction
//!
//! wav2vec2 models consume the raw waveform; the "features" are the samples
//! themselves after the model's declared preprocessing (zero-mean/unit-variance
//! normalization, truncation, padding) plus an attention mask over the valid
//! samples.

use crate::audio::{Waveform, TARGET_SAMPLE_RATE};
use crate::error::{StageError, StageResult};
use candle_core::{Device, Tensor};
use serde::Deserialize;
use tracing::debug;

/// Variance floor used by zero-mean/unit-variance normalization
const NORMALIZATION_EPSILON: f64 = 1e-7;

/// Preprocessing recipe shipped with a model (`preprocessor_config.json`)
///
/// Unknown keys in the file (`feature_extractor_type`, `padding_side`, ...) are
/// ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreprocessorConfig {
    #[serde(default = "default_true")]
    pub do_normalize: bool,

    #[serde(default)]
    pub padding_value: f32,

    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,

    #[serde(default = "default_feature_size")]
    pub feature_size: usize,

    #[serde(default = "default_true")]
    pub return_attention_mask: bool,

    /// Pad shorter waveforms up to this many samples
    #[serde(default)]
    pub min_length: Option<usize>,

    /// Truncate longer waveforms to this many samples
    #[serde(default)]
    pub max_length: Option<usize>,

    #[serde(default)]
    pub pad_to_multiple_of: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_sampling_rate() -> u32 {
    TARGET_SAMPLE_RATE
}

fn default_feature_size() -> usize {
    1
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_normalize: true,
            padding_value: 0.0,
            sampling_rate: TARGET_SAMPLE_RATE,
            feature_size: 1,
            return_attention_mask: true,
            min_length: None,
            max_length: None,
            pad_to_multiple_of: None,
        }
    }
}

impl PreprocessorConfig {
    /// Ensure padded inputs are at least `samples` long
    pub fn raise_min_length(&mut self, samples: usize) {
        let current = self.min_length.unwrap_or(0);
        if samples > current {
            self.min_length = Some(samples);
        }
    }
}

/// Model input: `[1, samples]` values plus a same-shaped attention mask
///
/// Mask entries are 1 for samples taken from the waveform and 0 for padding.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    values: Vec<f32>,
    attention_mask: Vec<u32>,
}

impl FeatureTensor {
    /// Build a tensor, checking that values and mask agree in length
    pub fn new(values: Vec<f32>, attention_mask: Vec<u32>) -> StageResult<Self> {
        if values.len() != attention_mask.len() {
            return Err(StageError::FeatureExtraction(format!(
                "attention mask length {} does not match {} samples",
                attention_mask.len(),
                values.len()
            )));
        }
        if values.is_empty() {
            return Err(StageError::FeatureExtraction(
                "feature tensor is empty".to_string(),
            ));
        }
        Ok(Self {
            values,
            attention_mask,
        })
    }

    pub fn shape(&self) -> [usize; 2] {
        [1, self.values.len()]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn attention_mask(&self) -> &[u32] {
        &self.attention_mask
    }

    /// Number of samples taken from the waveform (mask == 1)
    pub fn valid_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m != 0).count()
    }

    /// Values as a `[1, samples]` f32 tensor on `device`
    pub fn to_tensor(&self, device: &Device) -> candle_core::Result<Tensor> {
        Tensor::from_slice(&self.values, (1, self.values.len()), device)
    }
}

/// Applies a [`PreprocessorConfig`] to waveforms
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    recipe: PreprocessorConfig,
}

impl FeatureExtractor {
    pub fn new(recipe: PreprocessorConfig) -> Self {
        Self { recipe }
    }

    pub fn recipe(&self) -> &PreprocessorConfig {
        &self.recipe
    }

    /// Convert a waveform into model input.
    ///
    /// # Errors
    /// `StageError::FeatureExtraction` when the waveform rate differs from the
    /// recipe's, the recipe asks for more than one feature per sample, or a
    /// sample is NaN/infinite.
    pub fn extract(&self, waveform: &Waveform) -> StageResult<FeatureTensor> {
        let recipe = &self.recipe;

        if waveform.sample_rate() != recipe.sampling_rate {
            return Err(StageError::FeatureExtraction(format!(
                "waveform is {} Hz, model expects {} Hz",
                waveform.sample_rate(),
                recipe.sampling_rate
            )));
        }
        if recipe.feature_size != 1 {
            return Err(StageError::FeatureExtraction(format!(
                "unsupported feature_size {} (raw waveform models use 1)",
                recipe.feature_size
            )));
        }
        if waveform.is_empty() {
            return Err(StageError::FeatureExtraction(
                "waveform has no samples".to_string(),
            ));
        }
        if let Some(pos) = waveform.samples().iter().position(|s| !s.is_finite()) {
            return Err(StageError::FeatureExtraction(format!(
                "non-finite sample at index {}",
                pos
            )));
        }

        let mut valid: Vec<f32> = waveform.samples().to_vec();
        if let Some(max_length) = recipe.max_length {
            if max_length > 0 && valid.len() > max_length {
                debug!("Truncating {} samples to {}", valid.len(), max_length);
                valid.truncate(max_length);
            }
        }

        if recipe.do_normalize {
            zero_mean_unit_var(&mut valid);
        }

        let valid_len = valid.len();
        let mut target_len = valid_len.max(recipe.min_length.unwrap_or(0));
        if let Some(multiple) = recipe.pad_to_multiple_of.filter(|&m| m > 0) {
            target_len = target_len.div_ceil(multiple) * multiple;
        }

        let mut values = valid;
        values.resize(target_len, recipe.padding_value);

        let mut attention_mask = vec![1u32; valid_len];
        attention_mask.resize(target_len, 0);

        debug!(
            "Extracted features: {} valid samples, {} total",
            valid_len, target_len
        );

        FeatureTensor::new(values, attention_mask)
    }
}

/// In-place `(x - mean) / sqrt(var + eps)` with f64 accumulation
fn zero_mean_unit_var(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let denom = (var + NORMALIZATION_EPSILON).sqrt();
    for sample in samples.iter_mut() {
        *sample = ((*sample as f64 - mean) / denom) as f32;
    }
}
