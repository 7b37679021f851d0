//! Stub acoustic networks
//!
//! Stand in for the pretrained wav2vec2 model so pipeline and HTTP tests run
//! without weights on disk.

use moodlift_common::CanonicalMap;
use moodlift_ser::inference::{
    AcousticNetwork, EmotionModel, FeatureTensor, LabelTable, PreprocessorConfig,
};
use moodlift_ser::InferencePipeline;
use std::sync::Arc;

/// Raw labels in the order the bundled speech-emotion checkpoint uses
pub const RAW_LABELS: [&str; 8] = [
    "angry", "calm", "disgust", "fearful", "happy", "neutral", "sad", "surprised",
];

/// Logits from simple statistics of the valid samples
///
/// Class `i` scores the mean absolute value of the i-th eighth of the clip,
/// so different clips rank differently and silence gives a uniform
/// distribution.
pub struct EnergyNetwork {
    num_labels: usize,
}

impl AcousticNetwork for EnergyNetwork {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn min_input_len(&self) -> usize {
        400
    }

    fn forward(&self, features: &FeatureTensor) -> candle_core::Result<Vec<f32>> {
        let valid = &features.values()[..features.valid_len()];
        let chunk = valid.len().div_ceil(self.num_labels).max(1);
        let mut logits = vec![0.0f32; self.num_labels];
        for (i, part) in valid.chunks(chunk).enumerate().take(self.num_labels) {
            logits[i] = part.iter().map(|v| v.abs()).sum::<f32>() / part.len() as f32;
        }
        Ok(logits)
    }
}

/// Always fails the forward pass
pub struct FailingNetwork;

impl AcousticNetwork for FailingNetwork {
    fn num_labels(&self) -> usize {
        RAW_LABELS.len()
    }

    fn min_input_len(&self) -> usize {
        1
    }

    fn forward(&self, _: &FeatureTensor) -> candle_core::Result<Vec<f32>> {
        Err(candle_core::Error::Msg("simulated device failure".to_string()))
    }
}

pub fn label_table(labels: &[&str]) -> LabelTable {
    LabelTable::new(labels.iter().map(|s| s.to_string()).collect())
}

/// Energy network over `labels`
pub fn energy_model(labels: &[&str]) -> EmotionModel {
    EmotionModel::from_parts(
        "stub-energy",
        Box::new(EnergyNetwork {
            num_labels: labels.len(),
        }),
        label_table(labels),
        PreprocessorConfig::default(),
    )
    .expect("stub model")
}

/// Pipeline over the energy network with the default vocabulary
pub fn stub_pipeline() -> InferencePipeline {
    InferencePipeline::new(Arc::new(energy_model(&RAW_LABELS)), CanonicalMap::default())
}
