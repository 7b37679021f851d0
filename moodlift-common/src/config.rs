//! Configuration loading and root folder resolution
//!
//! Settings resolve in this order, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! The first two tiers are handled by the binary's `clap` parser (flags carry
//! `env` fallbacks); this module supplies tiers 3 and 4.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the TOML file looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "moodlift.toml";

/// Name of the SQLite database created inside the root folder
pub const DATABASE_FILE_NAME: &str = "moodlift.db";

/// Contents of `moodlift.toml`
///
/// Every field is optional so that a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the credential database
    pub root_folder: Option<PathBuf>,
    /// Interface to bind the HTTP server to
    pub bind_addr: Option<String>,
    /// HTTP port
    pub port: Option<u16>,
    /// Origins allowed by the CORS layer
    pub cors_origins: Option<Vec<String>>,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: Option<usize>,
    /// Upper bound on inferences running at the same time
    pub max_concurrent_inferences: Option<usize>,
    pub logging: LoggingConfig,
    pub model: ModelSection,
    /// Extra raw label -> canonical emotion mappings
    pub emotions: BTreeMap<String, String>,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset (e.g. "info", "debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[model]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Directory holding config.json, preprocessor_config.json and the weights
    pub dir: Option<PathBuf>,
    /// Human-readable artifact name, reported by /health
    pub name: Option<String>,
    /// "cpu" or "cuda"
    pub device: Option<String>,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config from an explicit path, or from the platform default
/// location when `explicit` is `None`.
///
/// A missing default file is not an error: compiled defaults apply.
/// A missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_file() {
        Some(path) => {
            debug!("Loading config file: {}", path.display());
            load_toml_config(&path)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Locate the default config file for the platform, if one exists
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("moodlift").join(CONFIG_FILE_NAME));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/moodlift").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder.
///
/// `cli_arg` already carries the environment fallback when it comes from clap;
/// `env_var_name` is consulted for callers that do not go through clap.
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/moodlift (or /var/lib/moodlift for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("moodlift"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/moodlift"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("moodlift"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/moodlift"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("moodlift"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\moodlift"))
    } else {
        PathBuf::from("./moodlift_data")
    }
}

/// Creates the root folder on first start and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if self.path.exists() {
            if !self.path.is_dir() {
                return Err(Error::Config(format!(
                    "Root folder is not a directory: {}",
                    self.path.display()
                )));
            }
            return Ok(());
        }

        warn!("Root folder missing, creating: {}", self.path.display());
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE_NAME)
    }
}
