//! Canonical container -> waveform
//!
//! Reads the RIFF/WAVE bytes produced by the normalizer with hound. Integer
//! PCM is accepted too and scaled to [-1.0, 1.0]; multi-channel input is
//! averaged to mono and any rate other than the target is resampled.

use crate::audio::resampler::resample_mono;
use crate::audio::{NormalizedAudio, Waveform, TARGET_SAMPLE_RATE};
use crate::error::{StageError, StageResult};
use std::io::Cursor;
use tracing::debug;

/// Parses normalized audio into a [`Waveform`]
#[derive(Debug, Clone)]
pub struct SignalLoader {
    target_sample_rate: u32,
}

impl Default for SignalLoader {
    fn default() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

impl SignalLoader {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Load mono samples at the target rate.
    ///
    /// # Errors
    /// - `StageError::Load` if the container is not valid RIFF/WAVE or a
    ///   sample cannot be read
    /// - `StageError::EmptySignal` if the container holds zero frames
    pub fn load(&self, audio: &NormalizedAudio) -> StageResult<Waveform> {
        let reader = hound::WavReader::new(Cursor::new(audio.as_bytes()))
            .map_err(|e| StageError::Load(format!("Invalid WAV container: {}", e)))?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(StageError::Load("WAV declares zero channels".to_string()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| StageError::Load(format!("Failed to read samples: {}", e)))?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<_, _>>()
                    .map_err(|e| StageError::Load(format!("Failed to read samples: {}", e)))?
            }
        };

        let channels = spec.channels as usize;
        let mono: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        if mono.is_empty() {
            return Err(StageError::EmptySignal);
        }

        let samples = resample_mono(&mono, spec.sample_rate, self.target_sample_rate)
            .map_err(|e| StageError::Load(e.to_string()))?;

        debug!(
            "Loaded {} samples ({} ch, {} Hz) -> {} samples at {} Hz",
            mono.len(),
            spec.channels,
            spec.sample_rate,
            samples.len(),
            self.target_sample_rate
        );

        Waveform::new(samples, self.target_sample_rate)
    }
}
