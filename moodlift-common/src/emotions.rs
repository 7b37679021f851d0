//! Canonical emotion vocabulary and the emotion -> playlist table
//!
//! Canonical emotion identifiers are the lowercase names shared by the
//! inference pipeline (which produces them) and the playlist lookup (which
//! consumes them).

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Emotion the playlist lookup falls back to for unknown keys
pub const FALLBACK_EMOTION: &str = "neutral";

/// Canonical vocabulary of the bundled speech-emotion model
pub const DEFAULT_EMOTIONS: [&str; 8] = [
    "angry",
    "disgust",
    "fearful",
    "happy",
    "neutral",
    "sad",
    "surprised",
    "calm",
];

/// Raw model label -> canonical emotion
///
/// Advisory normalization: labels without an entry pass through unchanged
/// (lowercased), so a model with a different vocabulary still works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMap {
    entries: HashMap<String, String>,
}

impl Default for CanonicalMap {
    fn default() -> Self {
        Self {
            entries: DEFAULT_EMOTIONS
                .iter()
                .map(|e| (e.to_string(), e.to_string()))
                .collect(),
        }
    }
}

impl CanonicalMap {
    /// Map with no entries (every label passes through)
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Default vocabulary plus overrides; override keys are lowercased
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (raw, canonical) in overrides {
            map.insert(raw, canonical);
        }
        map
    }

    pub fn insert(&mut self, raw_label: &str, canonical: &str) {
        self.entries
            .insert(raw_label.to_lowercase(), canonical.to_lowercase());
    }

    /// Canonical emotion for a raw label
    pub fn canonicalize(&self, raw_label: &str) -> String {
        let key = raw_label.to_lowercase();
        match self.entries.get(&key) {
            Some(canonical) => canonical.clone(),
            None => key,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Curated playlist reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub name: String,
    pub url: String,
}

impl Playlist {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Canonical emotion -> playlist
#[derive(Debug, Clone)]
pub struct PlaylistTable {
    playlists: HashMap<String, Playlist>,
}

impl Default for PlaylistTable {
    fn default() -> Self {
        let playlists = [
            ("happy", "Feel-Good Hits", "https://open.spotify.com/playlist/37i9dQZF1DXdPec7aLTmlC"),
            ("sad", "Sad Vibes", "https://open.spotify.com/playlist/37i9dQZF1DX7qK8ma5wgG1"),
            ("neutral", "Lo-Fi Chill", "https://open.spotify.com/playlist/37i9dQZF1DWSf2RDTDayIx"),
            ("angry", "Chill Hits", "https://open.spotify.com/playlist/37i9dQZF1DX4WYpdgoIcn6"),
            ("surprised", "Viral Hits", "https://open.spotify.com/playlist/37i9dQZF1DXcZDD7cfEKhW"),
            ("fearful", "Confidence Boost", "https://open.spotify.com/playlist/37i9dQZF1DX4fpCWaHOned"),
            ("disgust", "Mood Booster", "https://open.spotify.com/playlist/37i9dQZF1DX3rxVfibe1L0"),
            ("calm", "Relaxation", "https://open.spotify.com/playlist/37i9dQZF1DX4sWSpwq3LiO"),
        ]
        .into_iter()
        .map(|(emotion, name, url)| (emotion.to_string(), Playlist::new(name, url)))
        .collect();

        Self { playlists }
    }
}

impl PlaylistTable {
    /// Playlist for `emotion`, or the `neutral` playlist when absent.
    ///
    /// Returns `None` only if the table has no `neutral` entry either.
    pub fn lookup(&self, emotion: &str) -> Option<&Playlist> {
        self.playlists
            .get(emotion)
            .or_else(|| self.playlists.get(FALLBACK_EMOTION))
    }

    pub fn insert(&mut self, emotion: &str, playlist: Playlist) {
        self.playlists.insert(emotion.to_string(), playlist);
    }
}
