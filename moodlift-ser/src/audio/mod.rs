//! Audio front end of the inference pipeline
//!
//! - [`normalizer`]: any supported container -> canonical mono 16 kHz WAV bytes
//! - [`loader`]: canonical WAV bytes -> [`Waveform`]
//! - [`resampler`]: rubato sinc resampling shared by both

pub mod loader;
pub mod normalizer;
pub mod resampler;

pub use loader::SignalLoader;
pub use normalizer::AudioNormalizer;

use crate::error::{StageError, StageResult};

/// Sample rate every waveform entering feature extraction is at
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Canonical uncompressed container (RIFF/WAVE, mono, 32-bit float) produced by
/// [`AudioNormalizer`]. Lives only for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    bytes: Vec<u8>,
}

impl NormalizedAudio {
    /// Wrap container bytes. No validation happens here; [`SignalLoader`]
    /// rejects anything it cannot parse.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Mono f32 samples at a known rate. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Build a waveform, rejecting an empty sample buffer
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> StageResult<Self> {
        if samples.is_empty() {
            return Err(StageError::EmptySignal);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
