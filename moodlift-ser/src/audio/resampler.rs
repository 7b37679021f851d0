//! Mono sample rate conversion using rubato
//!
//! The whole clip is one rubato chunk, which keeps the output a pure function
//! of the input. The last half filter length of input is held back by the sinc
//! window; flushing with zero chunks releases it, so N input frames yield
//! round(N * ratio) output frames.

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use thiserror::Error;
use tracing::debug;

/// Resampling failure (construction or processing)
#[derive(Debug, Error)]
#[error("Resampling {from} Hz -> {to} Hz failed: {message}")]
pub struct ResampleError {
    pub from: u32,
    pub to: u32,
    pub message: String,
}

const SINC_LEN: usize = 256;

/// Resample mono samples from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match; empty input yields empty output.
pub fn resample_mono(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    let fail = |message: String| ResampleError {
        from: input_rate,
        to: output_rate,
        message,
    };

    if input_rate == 0 || output_rate == 0 {
        return Err(fail("sample rate must be non-zero".to_string()));
    }

    if input_rate == output_rate {
        debug!("Sample rate already at {} Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }

    if input.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = output_rate as f64 / input_rate as f64;

    let expected = (input.len() as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, input.len(), 1)
        .map_err(|e| fail(e.to_string()))?;

    let output = resampler
        .process(&[input], None)
        .map_err(|e| fail(e.to_string()))?;
    let mut samples = output.into_iter().next().unwrap_or_default();

    // Drain the filter tail; chunks shorter than the window need several passes
    let max_flushes = 2 + 2 * SINC_LEN / input.len();
    let mut flushes = 0usize;
    while samples.len() < expected && flushes < max_flushes {
        let tail = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| fail(e.to_string()))?;
        if let Some(tail) = tail.into_iter().next() {
            samples.extend_from_slice(&tail);
        }
        flushes += 1;
    }

    samples.truncate(expected);

    debug!(
        "Resampled {} samples ({} Hz) -> {} samples ({} Hz)",
        input.len(),
        input_rate,
        samples.len(),
        output_rate
    );

    Ok(samples)
}
