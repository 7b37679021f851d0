//! moodlift-ser library interface
//!
//! Speech emotion recognition: an uploaded recording goes through
//! [`audio`] (decode, downmix, resample), [`inference`] (feature extraction,
//! wav2vec2 forward pass, softmax, ranking) orchestrated by
//! [`pipeline::InferencePipeline`], and comes back as the three most likely
//! emotions. The HTTP surface ([`api`]) also serves playlists and a small
//! credential store ([`db`]).

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult, PipelineError, Stage, StageError};
pub use crate::pipeline::InferencePipeline;

use crate::config::ServerSettings;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use chrono::{DateTime, Utc};
use moodlift_common::PlaylistTable;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Inference pipeline over the load-once model
    pub pipeline: Arc<InferencePipeline>,
    /// Credential store
    pub db: SqlitePool,
    /// Canonical emotion -> playlist
    pub playlists: Arc<PlaylistTable>,
    /// Bounds inferences running on the blocking pool
    pub inference_slots: Arc<Semaphore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: InferencePipeline, db: SqlitePool, max_concurrent_inferences: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            db,
            playlists: Arc::new(PlaylistTable::default()),
            inference_slots: Arc::new(Semaphore::new(max_concurrent_inferences.max(1))),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    Router::new()
        .merge(api::predict_routes())
        .merge(api::playlist_routes())
        .merge(api::auth_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
