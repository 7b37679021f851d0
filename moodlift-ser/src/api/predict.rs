//! Emotion prediction endpoint

use crate::inference::EmotionPrediction;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info};

/// Container assumed when the upload carries no usable file name
pub const DEFAULT_CONTAINER_FORMAT: &str = "webm";

/// Multipart field carrying the recording
pub const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub emotions: Vec<EmotionPrediction>,
    pub status: String,
    pub message: String,
}

/// Uploaded recording extracted from the multipart body
struct AudioUpload {
    bytes: Vec<u8>,
    container_format: String,
}

/// POST /predict
///
/// **Request:** multipart form with an `audio` file field (browser recorders
/// send WebM/Opus).
/// **Response:** `{"emotions": [["happy", 0.81], ...], "status": "success",
/// "message": "Detected 3 emotions"}`
///
/// **Errors:**
/// - 400: missing/empty upload, or audio that cannot be decoded, loaded or
///   turned into features
/// - 500: model or ranking failure
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<PredictResponse>> {
    let upload = read_upload(multipart).await?;

    // Bound concurrent forward passes; the permit travels with the blocking task
    let permit = state
        .inference_slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("Inference slots closed".to_string()))?;

    let pipeline = state.pipeline.clone();
    let size = upload.bytes.len();
    let format = upload.container_format.clone();

    let result = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.run(&upload.bytes, &upload.container_format)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))?;

    match result {
        Ok(emotions) => {
            info!(
                "Predicted {:?} from {} bytes ({})",
                emotions.first().map(|p| p.emotion.as_str()),
                size,
                format
            );
            let message = format!("Detected {} emotions", emotions.len());
            Ok(Json(PredictResponse {
                emotions,
                status: "success".to_string(),
                message,
            }))
        }
        Err(err) => {
            error!("Prediction failed for {} byte upload ({}): {}", size, format, err);
            *state.last_error.write().await = Some(err.to_string());
            Err(err.into())
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<AudioUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        if matches!(file_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ApiError::BadRequest("No audio file selected".to_string()));
        }

        let container_format = file_name
            .as_deref()
            .and_then(extension_of)
            .or_else(|| field.content_type().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CONTAINER_FORMAT.to_string());

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Empty audio file".to_string()));
        }

        return Ok(AudioUpload {
            bytes: bytes.to_vec(),
            container_format,
        });
    }

    Err(ApiError::BadRequest("No audio uploaded".to_string()))
}

/// Lowercase extension of a file name ("clip.WEBM" -> "webm")
fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
