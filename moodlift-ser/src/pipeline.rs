//! Inference pipeline
//!
//! Received -> Normalized -> Loaded -> Extracted -> Classified -> Ranked.
//! Stages run sequentially on the calling thread; the first failure ends the
//! run with a [`PipelineError`] tagged by the stage that failed.

use crate::audio::{AudioNormalizer, SignalLoader};
use crate::error::{PipelineError, Stage};
use crate::inference::{rank, EmotionModel, EmotionPrediction};
use moodlift_common::CanonicalMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Number of predictions the service reports per request
pub const DEFAULT_TOP_K: usize = 3;

/// Stateless orchestrator over a shared, immutable model
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    model: Arc<EmotionModel>,
    normalizer: AudioNormalizer,
    loader: SignalLoader,
    canonical: CanonicalMap,
    top_k: usize,
}

impl InferencePipeline {
    pub fn new(model: Arc<EmotionModel>, canonical: CanonicalMap) -> Self {
        let sample_rate = model.preprocessing().sampling_rate;
        Self {
            model,
            normalizer: AudioNormalizer::new(sample_rate),
            loader: SignalLoader::new(sample_rate),
            canonical,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of predictions (the service always uses 3)
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn model(&self) -> &EmotionModel {
        &self.model
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run every stage on `raw` (declared as `container_format`).
    ///
    /// Returns exactly `top_k` predictions sorted by descending confidence.
    pub fn run(
        &self,
        raw: &[u8],
        container_format: &str,
    ) -> Result<Vec<EmotionPrediction>, PipelineError> {
        let started = Instant::now();

        let normalized = self
            .normalizer
            .normalize(raw, container_format)
            .map_err(|e| PipelineError::new(Stage::Decode, e))?;
        debug!(
            "decode: {} bytes ({}) -> {} bytes WAV in {:?}",
            raw.len(),
            container_format,
            normalized.len(),
            started.elapsed()
        );

        let stage_start = Instant::now();
        let waveform = self
            .loader
            .load(&normalized)
            .map_err(|e| PipelineError::new(Stage::Load, e))?;
        debug!(
            "load: {} samples ({:.2}s) in {:?}",
            waveform.len(),
            waveform.duration_seconds(),
            stage_start.elapsed()
        );

        let stage_start = Instant::now();
        let features = self
            .model
            .feature_extractor()
            .extract(&waveform)
            .map_err(|e| PipelineError::new(Stage::Extract, e))?;
        debug!(
            "extract: shape {:?}, {} valid in {:?}",
            features.shape(),
            features.valid_len(),
            stage_start.elapsed()
        );

        let stage_start = Instant::now();
        let dist = self
            .model
            .classify(&features)
            .map_err(|e| PipelineError::new(Stage::Classify, e))?;
        debug!("classify: {} classes in {:?}", dist.len(), stage_start.elapsed());

        let predictions = rank(&dist, self.top_k, self.model.labels(), &self.canonical)
            .map_err(|e| PipelineError::new(Stage::Rank, e))?;

        debug!(
            "Pipeline finished in {:?}: {:?}",
            started.elapsed(),
            predictions
                .iter()
                .map(|p| (p.emotion.as_str(), p.confidence))
                .collect::<Vec<_>>()
        );

        Ok(predictions)
    }
}
