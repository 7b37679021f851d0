//! In-memory WAV generation
//!
//! Deterministic clips for pipeline tests: silence and sine tones, mono or
//! stereo, at arbitrary rates. Everything stays in a `Vec<u8>`.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

fn write_wav(spec: WavSpec, frames: usize, mut sample: impl FnMut(usize, u16) -> f32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("WAV header");
        for frame in 0..frames {
            for channel in 0..spec.channels {
                let value = sample(frame, channel).clamp(-1.0, 1.0);
                writer
                    .write_sample((value * i16::MAX as f32) as i16)
                    .expect("WAV sample");
            }
        }
        writer.finalize().expect("WAV finalize");
    }
    cursor.into_inner()
}

fn spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Mono 16-bit silence
pub fn silent_wav(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
    write_wav(spec(1, sample_rate), frames, |_, _| 0.0)
}

/// Mono 16-bit sine tone
pub fn sine_wav(duration_ms: u64, sample_rate: u32, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
    write_wav(spec(1, sample_rate), frames, |i, _| {
        amplitude * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin()
    })
}

/// Stereo 16-bit clip with a different tone in each channel
pub fn stereo_sine_wav(
    duration_ms: u64,
    sample_rate: u32,
    left_hz: f32,
    right_hz: f32,
    amplitude: f32,
) -> Vec<u8> {
    let frames = (sample_rate as u64 * duration_ms / 1000) as usize;
    write_wav(spec(2, sample_rate), frames, |i, channel| {
        let hz = if channel == 0 { left_hz } else { right_hz };
        amplitude * (2.0 * PI * hz * i as f32 / sample_rate as f32).sin()
    })
}
