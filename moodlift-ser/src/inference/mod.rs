//! Model side of the inference pipeline
//!
//! - [`preprocess`]: waveform -> [`FeatureTensor`] following the model's recipe
//! - [`model`]: load-once [`EmotionModel`] (network + labels + recipe)
//! - [`wav2vec2`]: candle wav2vec2 sequence classifier
//! - [`classifier`]: forward pass + softmax -> [`ProbabilityDistribution`]
//! - [`ranker`]: top-k selection and canonical label mapping

pub mod classifier;
pub mod model;
pub mod preprocess;
pub mod ranker;
pub mod wav2vec2;

pub use classifier::ProbabilityDistribution;
pub use model::{AcousticNetwork, EmotionModel, LabelTable, ModelLoadError};
pub use preprocess::{FeatureExtractor, FeatureTensor, PreprocessorConfig};
pub use ranker::{rank, EmotionPrediction};
