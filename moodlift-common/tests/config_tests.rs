//! Configuration loading and root folder resolution tests

use moodlift_common::config::{
    load_config, load_toml_config, resolve_root_folder, RootFolder, TomlConfig,
};
use serial_test::serial;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

const ENV_VAR: &str = "MOODLIFT_TEST_ROOT_FOLDER";

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config_file() {
    let file = write_config(
        r#"
        root_folder = "/srv/moodlift"
        bind_addr = "0.0.0.0"
        port = 5001
        cors_origins = ["http://localhost:5500"]
        max_upload_bytes = 1048576
        max_concurrent_inferences = 2

        [logging]
        level = "debug"

        [model]
        dir = "/opt/models/emotion"
        name = "wav2vec2-lg-xlsr-en-speech-emotion-recognition"
        device = "cpu"

        [emotions]
        ang = "angry"
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/moodlift")));
    assert_eq!(config.bind_addr.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(5001));
    assert_eq!(config.cors_origins.as_ref().map(Vec::len), Some(1));
    assert_eq!(config.max_upload_bytes, Some(1_048_576));
    assert_eq!(config.max_concurrent_inferences, Some(2));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.model.device.as_deref(), Some("cpu"));
    assert_eq!(config.emotions.get("ang").map(String::as_str), Some("angry"));
}

#[test]
fn test_malformed_config_is_config_error() {
    let file = write_config("port = \"not a number\"");
    let err = load_toml_config(file.path()).unwrap_err();
    assert!(matches!(err, moodlift_common::Error::Config(_)), "got {:?}", err);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(load_config(Some(&missing)).is_err());
}

#[test]
#[serial]
fn test_root_folder_cli_wins() {
    std::env::set_var(ENV_VAR, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), ENV_VAR, &toml);
    std::env::remove_var(ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    std::env::set_var(ENV_VAR, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ENV_VAR, &toml);
    std::env::remove_var(ENV_VAR);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_root_folder_toml_then_default() {
    std::env::remove_var(ENV_VAR);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    assert_eq!(
        resolve_root_folder(None, ENV_VAR, &toml),
        PathBuf::from("/from/toml")
    );

    let fallback = resolve_root_folder(None, ENV_VAR, &TomlConfig::default());
    assert!(fallback.ends_with("moodlift") || fallback.ends_with("moodlift_data"));
}

#[test]
fn test_root_folder_created_on_demand() {
    let dir = TempDir::new().unwrap();
    let root = RootFolder::new(dir.path().join("nested").join("root"));

    root.ensure_directory_exists().unwrap();

    assert!(root.path().is_dir());
    // Second call is a no-op
    root.ensure_directory_exists().unwrap();
}

#[test]
fn test_root_folder_that_is_a_file_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    let root = RootFolder::new(file.path().to_path_buf());
    assert!(root.ensure_directory_exists().is_err());
}
