//! Sign-up and login endpoints

use crate::db::users;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use moodlift_common::auth::{generate_token, hash_password, verify_password};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Usernames are case-insensitive
    fn normalized_username(&self) -> String {
        self.username.trim().to_lowercase()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

/// POST /signup
///
/// **Request:** `{"username": "...", "password": "..."}`
/// **Response:** 201 `{"message": "User registered successfully"}`
///
/// **Errors:** 400 for blank fields or an existing username
pub async fn signup(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let username = credentials.normalized_username();
    if username.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let password = credentials.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

    if !users::create_user(&state.db, &username, &hash).await? {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    info!("Registered user '{}'", username);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// POST /login
///
/// **Request:** `{"username": "...", "password": "..."}`
/// **Response:** `{"message": "Login successful", "token": "<hex>"}`; the token
/// is valid for 24 hours
///
/// **Errors:** 401 `Invalid credentials` for an unknown user or wrong password
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let username = credentials.normalized_username();
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = users::find_user(&state.db, &username)
        .await?
        .ok_or_else(invalid)?;

    let password = credentials.password;
    let stored = user.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check failed: {}", e)))?;
    if !valid {
        return Err(invalid());
    }

    let issued = users::store_token(&state.db, &username, &generate_token()).await?;
    info!("User '{}' logged in, token expires {}", username, issued.expires_at);

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token: issued.token,
    }))
}

/// Build authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
