use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply from `GET /me/player/recently-played`. Only the fields we read are
/// modelled; leaf values are optional so a JSON `null` survives to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentlyPlayed {
    pub items: Vec<PlayHistoryItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistoryItem {
    #[serde(default)]
    pub track: Option<TrackObject>,
    #[serde(default)]
    pub played_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub artists: Option<Vec<ArtistObject>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistObject {
    #[serde(default)]
    pub name: Option<String>,
}

/// A shaped row before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayRecord {
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub played_at: Option<String>,
    pub timestamp: Option<String>,
}

/// A validated row, one per play, keyed by `played_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub song_name: String,
    pub artist_name: String,
    pub played_at: String,
    /// Date part (`YYYY-MM-DD`) of `played_at`.
    pub timestamp: String,
}

/// Rows for one fetch window, in API response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<PlayRecord>,
}

impl Batch {
    pub fn new(records: Vec<PlayRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PlayRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Short-lived bearer credential. Never persisted and never printed.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_debug_is_redacted() {
        let t = AccessToken::new("very-secret");
        assert_eq!(format!("{:?}", t), "AccessToken(***)");
        assert_eq!(t.bearer(), "Bearer very-secret");
    }

    #[test]
    fn null_leaves_deserialize_as_none() {
        let j = r#"{"items":[{"track":{"name":null,"album":{"artists":[{"name":"A"}]}},"played_at":"2024-05-05T10:00:00.000Z"}]}"#;
        let r: RecentlyPlayed = serde_json::from_str(j).unwrap();
        let track = r.items[0].track.as_ref().unwrap();
        assert!(track.name.is_none());
        let artists = track.album.as_ref().unwrap().artists.as_ref().unwrap();
        assert_eq!(artists[0].name.as_deref(), Some("A"));
    }

    #[test]
    fn null_or_missing_artist_list_deserializes_as_none() {
        let a: AlbumObject = serde_json::from_str(r#"{"artists":null}"#).unwrap();
        assert!(a.artists.is_none());
        let a: AlbumObject = serde_json::from_str("{}").unwrap();
        assert!(a.artists.is_none());
    }
}
