//! Shaping the recently-played reply into rows, and the validation gate in
//! front of the loader.

use crate::models::{Batch, PlayEvent, PlayRecord, RecentlyPlayed};
use std::collections::HashSet;

/// Length of the `YYYY-MM-DD` prefix of an ISO-8601 timestamp.
const DATE_PREFIX_LEN: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("item {0} has no track")]
    MissingTrack(usize),
    #[error("item {0} has no album")]
    MissingAlbum(usize),
    #[error("item {0} has no artists")]
    NoArtists(usize),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("primary key check is violated: played_at {0:?} appears more than once")]
    DuplicateKey(Option<String>),
    #[error("null values found: row {row} has no {column}")]
    NullValue { row: usize, column: &'static str },
}

/// Outcome of a successful validation.
#[derive(Debug, PartialEq, Eq)]
pub enum Validation {
    /// Nothing was played in the window; skip loading.
    Empty,
    Valid(Vec<PlayEvent>),
}

pub fn date_prefix(played_at: &str) -> String {
    played_at.chars().take(DATE_PREFIX_LEN).collect()
}

/// Flatten each item to (track name, first artist, played_at, date).
pub fn shape(resp: &RecentlyPlayed) -> Result<Batch, ShapeError> {
    let mut records = Vec::with_capacity(resp.items.len());
    for (i, item) in resp.items.iter().enumerate() {
        let track = item.track.as_ref().ok_or(ShapeError::MissingTrack(i))?;
        let album = track.album.as_ref().ok_or(ShapeError::MissingAlbum(i))?;
        let artist = album
            .artists
            .as_deref()
            .and_then(|a| a.first())
            .ok_or(ShapeError::NoArtists(i))?;
        records.push(PlayRecord {
            song_name: track.name.clone(),
            artist_name: artist.name.clone(),
            played_at: item.played_at.clone(),
            timestamp: item.played_at.as_deref().map(date_prefix),
        });
    }
    Ok(Batch::new(records))
}

/// Empty batches are skipped; duplicate keys are checked before nulls.
pub fn validate(batch: &Batch) -> Result<Validation, ValidationError> {
    if batch.is_empty() {
        return Ok(Validation::Empty);
    }

    let mut seen: HashSet<Option<&str>> = HashSet::with_capacity(batch.len());
    for r in batch.records() {
        if !seen.insert(r.played_at.as_deref()) {
            return Err(ValidationError::DuplicateKey(r.played_at.clone()));
        }
    }

    let mut events = Vec::with_capacity(batch.len());
    for (row, r) in batch.records().iter().enumerate() {
        events.push(PlayEvent {
            song_name: required(row, "song_name", &r.song_name)?,
            artist_name: required(row, "artist_name", &r.artist_name)?,
            played_at: required(row, "played_at", &r.played_at)?,
            timestamp: required(row, "timestamp", &r.timestamp)?,
        });
    }
    Ok(Validation::Valid(events))
}

fn required(row: usize, column: &'static str, v: &Option<String>) -> Result<String, ValidationError> {
    v.clone().ok_or(ValidationError::NullValue { row, column })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlbumObject, ArtistObject, PlayHistoryItem, TrackObject};

    fn item(name: Option<&str>, artists: &[&str], played_at: Option<&str>) -> PlayHistoryItem {
        PlayHistoryItem {
            track: Some(TrackObject {
                name: name.map(String::from),
                album: Some(AlbumObject {
                    artists: Some(
                        artists
                            .iter()
                            .map(|a| ArtistObject { name: Some(a.to_string()) })
                            .collect(),
                    ),
                }),
            }),
            played_at: played_at.map(String::from),
        }
    }

    fn record(played_at: &str) -> PlayRecord {
        PlayRecord {
            song_name: Some("Song".into()),
            artist_name: Some("Artist".into()),
            played_at: Some(played_at.into()),
            timestamp: Some(date_prefix(played_at)),
        }
    }

    #[test]
    fn shape_keeps_order_and_takes_first_artist() {
        let resp = RecentlyPlayed {
            items: vec![
                item(Some("One"), &["Lead", "Feat"], Some("2024-05-05T21:00:01.123Z")),
                item(Some("Two"), &["Solo"], Some("2024-05-04T08:30:00.000Z")),
            ],
            next: None,
        };
        let batch = shape(&resp).unwrap();
        assert_eq!(batch.len(), 2);
        let r = &batch.records()[0];
        assert_eq!(r.song_name.as_deref(), Some("One"));
        assert_eq!(r.artist_name.as_deref(), Some("Lead"));
        assert_eq!(r.timestamp.as_deref(), Some("2024-05-05"));
        assert_eq!(batch.records()[1].timestamp.as_deref(), Some("2024-05-04"));
    }

    #[test]
    fn shape_rejects_structural_gaps() {
        let mut resp = RecentlyPlayed {
            items: vec![item(Some("a"), &["b"], Some("2024-05-05T00:00:00Z")), item(Some("x"), &[], Some("t"))],
            next: None,
        };
        assert_eq!(shape(&resp), Err(ShapeError::NoArtists(1)));
        if let Some(album) = resp.items[1].track.as_mut().and_then(|t| t.album.as_mut()) {
            album.artists = None;
        }
        assert_eq!(shape(&resp), Err(ShapeError::NoArtists(1)));
        resp.items[1].track = None;
        assert_eq!(shape(&resp), Err(ShapeError::MissingTrack(1)));
    }

    #[test]
    fn date_prefix_of_short_string_is_whole_string() {
        assert_eq!(date_prefix("2024-05"), "2024-05");
    }

    #[test]
    fn empty_batch_is_skip_not_error() {
        assert_eq!(validate(&Batch::default()), Ok(Validation::Empty));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let batch = Batch::new(vec![record("2024-05-05T10:00:00Z"), record("2024-05-05T10:00:00Z")]);
        assert_eq!(
            validate(&batch),
            Err(ValidationError::DuplicateKey(Some("2024-05-05T10:00:00Z".into())))
        );
    }

    #[test]
    fn null_field_is_rejected_with_location() {
        let mut bad = record("2024-05-05T11:00:00Z");
        bad.artist_name = None;
        let batch = Batch::new(vec![record("2024-05-05T10:00:00Z"), bad]);
        assert_eq!(
            validate(&batch),
            Err(ValidationError::NullValue { row: 1, column: "artist_name" })
        );
    }

    #[test]
    fn two_missing_keys_count_as_duplicates() {
        let mut a = record("x");
        a.played_at = None;
        let batch = Batch::new(vec![a.clone(), a]);
        assert_eq!(validate(&batch), Err(ValidationError::DuplicateKey(None)));
    }

    #[test]
    fn valid_batch_converts_every_row() {
        let batch = Batch::new(vec![record("2024-05-05T10:00:00Z"), record("2024-05-05T09:00:00Z")]);
        match validate(&batch).unwrap() {
            Validation::Valid(events) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[1].played_at, "2024-05-05T09:00:00Z");
                assert_eq!(events[1].timestamp, "2024-05-05");
            }
            Validation::Empty => panic!("expected valid batch"),
        }
    }
}
