//! Top-k selection and canonical label mapping

use crate::error::{StageError, StageResult};
use crate::inference::classifier::ProbabilityDistribution;
use crate::inference::model::LabelTable;
use moodlift_common::CanonicalMap;
use serde::ser::{Serialize, Serializer};

/// Canonical emotion with its confidence (rounded to 3 decimals)
///
/// Serializes as a `[emotion, confidence]` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionPrediction {
    pub emotion: String,
    pub confidence: f64,
}

impl Serialize for EmotionPrediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.emotion, self.confidence).serialize(serializer)
    }
}

/// Select the `k` most probable classes, best first.
///
/// Exact ties keep ascending class index. Labels are lowercased and passed
/// through `canonical`; ranking uses full precision and only the reported
/// confidence is rounded.
///
/// # Errors
/// `StageError::InvalidArgument` if `k` exceeds the number of classes or the
/// label table length differs from the distribution length.
pub fn rank(
    dist: &ProbabilityDistribution,
    k: usize,
    labels: &LabelTable,
    canonical: &CanonicalMap,
) -> StageResult<Vec<EmotionPrediction>> {
    if labels.len() != dist.len() {
        return Err(StageError::InvalidArgument(format!(
            "label table has {} entries, distribution has {}",
            labels.len(),
            dist.len()
        )));
    }
    if k > dist.len() {
        return Err(StageError::InvalidArgument(format!(
            "k = {} exceeds {} classes",
            k,
            dist.len()
        )));
    }

    let probs = dist.probabilities();
    let mut order: Vec<usize> = (0..probs.len()).collect();
    // Stable sort keeps index order among equal probabilities
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    order
        .into_iter()
        .take(k)
        .map(|index| {
            let raw = labels.get(index).ok_or_else(|| {
                StageError::InvalidArgument(format!("no label for class {}", index))
            })?;
            Ok(EmotionPrediction {
                emotion: canonical.canonicalize(raw),
                confidence: round_confidence(probs[index]),
            })
        })
        .collect()
}

fn round_confidence(p: f64) -> f64 {
    (p * 1000.0).round() / 1000.0
}
