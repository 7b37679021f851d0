//! Test helper modules for moodlift-ser integration tests
//!
//! - audio_generator: in-memory WAV clips with known content
//! - stub_model: acoustic networks with predictable output

#![allow(dead_code)]

pub mod audio_generator;
pub mod stub_model;

pub use audio_generator::{sine_wav, silent_wav, stereo_sine_wav};
pub use stub_model::{energy_model, stub_pipeline, FailingNetwork, RAW_LABELS};
