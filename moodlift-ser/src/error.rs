//! Error types for moodlift-ser
//!
//! Two layers:
//! - [`StageError`] / [`PipelineError`]: what each pipeline stage can fail with,
//!   and the stage-tagged failure the pipeline surfaces
//! - [`ApiError`]: HTTP-facing error with a JSON body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failure raised by a single pipeline stage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// Input bytes are not valid for the declared container (corrupt header,
    /// unsupported codec, zero-length input)
    #[error("Audio decode failed: {0}")]
    Decode(String),

    /// Decoding succeeded but produced no samples
    #[error("No audio signal detected")]
    EmptySignal,

    /// Normalized container could not be parsed
    #[error("Audio load failed: {0}")]
    Load(String),

    /// Waveform does not fit the model's preprocessing recipe
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// Forward pass failed or produced non-finite output
    #[error("Model inference failed: {0}")]
    Inference(String),

    /// Caller passed an argument outside the operation's domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StageError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Decode(_) => "DECODE_ERROR",
            StageError::EmptySignal => "EMPTY_SIGNAL",
            StageError::Load(_) => "LOAD_ERROR",
            StageError::FeatureExtraction(_) => "FEATURE_EXTRACTION_ERROR",
            StageError::Inference(_) => "INFERENCE_ERROR",
            StageError::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }

    /// True when the failure is caused by the uploaded audio rather than by
    /// the model or the service
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StageError::Decode(_)
                | StageError::EmptySignal
                | StageError::Load(_)
                | StageError::FeatureExtraction(_)
        )
    }
}

/// Pipeline stage identity, used as the external error tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Decode,
    Load,
    Extract,
    Classify,
    Rank,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Load => "load",
            Stage::Extract => "extract",
            Stage::Classify => "classify",
            Stage::Rank => "rank",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-tagged pipeline failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, error: StageError) -> Self {
        Self { stage, error }
    }

    pub fn is_input_error(&self) -> bool {
        self.error.is_input_error()
    }
}

/// Convenience Result type for stage operations
pub type StageResult<T> = std::result::Result<T, StageError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Bad credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Inference pipeline failure (400 for input problems, 500 otherwise)
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// moodlift-common error
    #[error("Common error: {0}")]
    Common(#[from] moodlift_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": { "code": "NOT_FOUND", "message": msg } }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "code": "BAD_REQUEST", "message": msg } }),
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "code": "UNAUTHORIZED", "message": msg } }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": { "code": "INTERNAL_ERROR", "message": msg } }),
            ),
            ApiError::Pipeline(err) => {
                let status = if err.is_input_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    status,
                    json!({
                        "error": {
                            "code": err.error.kind(),
                            "stage": err.stage,
                            "message": err.error.to_string(),
                        }
                    }),
                )
            }
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": { "code": "DATABASE_ERROR", "message": err.to_string() } }),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": { "code": "COMMON_ERROR", "message": err.to_string() } }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
