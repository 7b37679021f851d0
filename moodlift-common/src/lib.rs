//! # MoodLift Common Library
//!
//! Shared code for the MoodLift services:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Canonical emotion vocabulary and playlist table
//! - Credential hashing and bearer token generation

pub mod auth;
pub mod config;
pub mod emotions;
pub mod error;

pub use emotions::{CanonicalMap, Playlist, PlaylistTable};
pub use error::{Error, Result};
