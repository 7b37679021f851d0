//! Forward pass and softmax

use crate::error::{StageError, StageResult};
use crate::inference::model::EmotionModel;
use crate::inference::preprocess::FeatureTensor;
use tracing::debug;

/// Class index -> probability; sums to 1.0 within floating-point tolerance
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDistribution(Vec<f64>);

impl ProbabilityDistribution {
    /// Softmax over raw logits (max-subtracted, f64 accumulation).
    ///
    /// # Errors
    /// `StageError::Inference` for empty or non-finite logits.
    pub fn from_logits(logits: &[f32]) -> StageResult<Self> {
        if logits.is_empty() {
            return Err(StageError::Inference("model produced no logits".to_string()));
        }
        if let Some(pos) = logits.iter().position(|l| !l.is_finite()) {
            return Err(StageError::Inference(format!(
                "non-finite logit at class {}",
                pos
            )));
        }

        let max = logits
            .iter()
            .map(|&l| l as f64)
            .fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        let probs: Vec<f64> = exps.into_iter().map(|e| e / sum).collect();
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(StageError::Inference(
                "softmax produced a non-finite probability".to_string(),
            ));
        }

        Ok(Self(probs))
    }

    /// Wrap probabilities that are already normalized
    pub fn from_probabilities(probs: Vec<f64>) -> Self {
        Self(probs)
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl EmotionModel {
    /// Run the network on `features` and return the class distribution.
    ///
    /// # Errors
    /// `StageError::Inference` if the forward pass fails, the logit count does
    /// not match the label table, or any value is non-finite.
    pub fn classify(&self, features: &FeatureTensor) -> StageResult<ProbabilityDistribution> {
        let logits = self
            .network()
            .forward(features)
            .map_err(|e| StageError::Inference(e.to_string()))?;

        if logits.len() != self.labels().len() {
            return Err(StageError::Inference(format!(
                "model produced {} logits for {} labels",
                logits.len(),
                self.labels().len()
            )));
        }

        let dist = ProbabilityDistribution::from_logits(&logits)?;
        debug!("Classified {} samples into {} classes", features.values().len(), dist.len());
        Ok(dist)
    }
}
