//! moodlift-ser - Speech Emotion Recognition service
//!
//! Accepts browser recordings over HTTP, runs them through the wav2vec2
//! emotion classifier and answers with the three most likely emotions.
//! Also serves emotion playlists and user sign-up/login.

use anyhow::{Context, Result};
use clap::Parser;
use moodlift_common::config::{load_config, resolve_root_folder, RootFolder};
use moodlift_ser::config::{ServerSettings, SettingsOverrides};
use moodlift_ser::inference::model::parse_device;
use moodlift_ser::inference::EmotionModel;
use moodlift_ser::{build_router, AppState, InferencePipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the root folder
const ROOT_FOLDER_ENV: &str = "MOODLIFT_ROOT_FOLDER";

/// Command-line arguments for moodlift-ser
#[derive(Parser, Debug)]
#[command(name = "moodlift-ser")]
#[command(about = "Speech emotion recognition service for MoodLift")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MOODLIFT_PORT")]
    port: Option<u16>,

    /// Interface to bind to
    #[arg(long, env = "MOODLIFT_BIND_ADDR")]
    bind: Option<String>,

    /// Root folder holding the credential database
    #[arg(short, long, env = "MOODLIFT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Pretrained model directory (config.json, preprocessor_config.json, weights)
    #[arg(short, long, env = "MOODLIFT_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Model name reported by /health
    #[arg(long, env = "MOODLIFT_MODEL_NAME")]
    model_name: Option<String>,

    /// Inference device: cpu, cuda or cuda:<n>
    #[arg(long, env = "MOODLIFT_DEVICE")]
    device: Option<String>,

    /// Maximum inferences running at once
    #[arg(long, env = "MOODLIFT_MAX_CONCURRENT_INFERENCES")]
    max_concurrent_inferences: Option<usize>,

    /// Config file (default: ~/.config/moodlift/moodlift.toml)
    #[arg(short, long, env = "MOODLIFT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so [logging] can set the filter
    let toml_config = load_config(args.config.as_deref())
        .context("Failed to load configuration file")?;

    let default_filter = format!(
        "moodlift_ser={level},moodlift_common={level},tower_http={level}",
        level = toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "moodlift-ser (Speech Emotion Recognition) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let settings = ServerSettings::resolve(
        SettingsOverrides {
            bind_addr: args.bind,
            port: args.port,
            model_dir: args.model_dir,
            model_name: args.model_name,
            device: args.device,
            max_concurrent_inferences: args.max_concurrent_inferences,
        },
        &toml_config,
    );

    // Root folder and credential database
    let root_folder = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        &toml_config,
    ));
    root_folder
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    let db_path = root_folder.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = moodlift_ser::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Model load is fatal on failure
    info!(
        "Loading emotion model '{}' from {} on {}",
        settings.model_name,
        settings.model_dir.display(),
        settings.device
    );
    let device = parse_device(&settings.device).map_err(|e| {
        error!("{}", e);
        e
    })?;
    let model_dir = settings.model_dir.clone();
    let model_name = settings.model_name.clone();
    let model = tokio::task::spawn_blocking(move || {
        EmotionModel::load(&model_dir, &model_name, &device)
    })
    .await
    .context("Model loading task failed")?
    .map_err(|e| {
        error!("Failed to load emotion model: {}", e);
        e
    })?;

    let pipeline = InferencePipeline::new(Arc::new(model), settings.canonical_map.clone());
    let state = AppState::new(pipeline, db_pool, settings.max_concurrent_inferences);
    let app = build_router(state, &settings);

    let addr = format!("{}:{}", settings.bind_addr, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!(
        "Max upload {} bytes, {} concurrent inferences",
        settings.max_upload_bytes, settings.max_concurrent_inferences
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
