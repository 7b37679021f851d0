//! HTTP API handlers for moodlift-ser

pub mod auth;
pub mod health;
pub mod playlist;
pub mod predict;

pub use auth::auth_routes;
pub use health::health_routes;
pub use playlist::playlist_routes;
pub use predict::predict_routes;
