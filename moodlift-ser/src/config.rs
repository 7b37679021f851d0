//! Resolved service settings
//!
//! Merges command-line/environment overrides (parsed by the binary) over the
//! TOML file and compiled defaults.

use moodlift_common::config::TomlConfig;
use moodlift_common::CanonicalMap;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MODEL_DIR: &str = "models/wav2vec2-lg-xlsr-en-speech-emotion-recognition";
pub const DEFAULT_MODEL_NAME: &str = "ehcalabres/wav2vec2-lg-xlsr-en-speech-emotion-recognition";
pub const DEFAULT_DEVICE: &str = "cpu";

/// Front-end origins allowed by default
pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://127.0.0.1:5500",
    "http://localhost:5500",
    "http://127.0.0.1:3000",
    "http://localhost:3000",
];

/// Highest-priority values (command line, then environment)
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub model_name: Option<String>,
    pub device: Option<String>,
    pub max_concurrent_inferences: Option<usize>,
}

/// Fully resolved settings for one server run
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub device: String,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub max_concurrent_inferences: usize,
    pub canonical_map: CanonicalMap,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::resolve(SettingsOverrides::default(), &TomlConfig::default())
    }
}

impl ServerSettings {
    pub fn resolve(overrides: SettingsOverrides, toml: &TomlConfig) -> Self {
        let max_concurrent_inferences = overrides
            .max_concurrent_inferences
            .or(toml.max_concurrent_inferences)
            .unwrap_or_else(default_concurrency)
            .max(1);

        Self {
            bind_addr: overrides
                .bind_addr
                .or_else(|| toml.bind_addr.clone())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            model_dir: overrides
                .model_dir
                .or_else(|| toml.model.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            model_name: overrides
                .model_name
                .or_else(|| toml.model.name.clone())
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            device: overrides
                .device
                .or_else(|| toml.model.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            cors_origins: toml
                .cors_origins
                .clone()
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()),
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_concurrent_inferences,
            canonical_map: CanonicalMap::with_overrides(&toml.emotions),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
