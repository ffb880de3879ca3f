use crate::models::PlayEvent;
use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA: &str = include_str!("../db/schema.sql");

/// Rows written by one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStats {
    pub inserted: usize,
    /// Rows not written because their `played_at` already existed (or,
    /// for an atomic append, because the whole batch was rolled back).
    pub skipped: usize,
}

pub fn open_or_create(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    log::info!("Opened database {}", path.display());
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Insert each event unless its `played_at` is already stored.
pub fn insert_ignore_conflicts(conn: &mut Connection, events: &[PlayEvent]) -> Result<LoadStats> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO spotify_tracks (song_name, artist_name, played_at, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in events {
            inserted += stmt.execute(params![e.song_name, e.artist_name, e.played_at, e.timestamp])?;
        }
    }
    tx.commit()?;
    Ok(LoadStats { inserted, skipped: events.len() - inserted })
}

/// Append all events in one transaction. Any collision aborts the whole
/// batch and nothing is written.
pub fn append_atomic(conn: &mut Connection, events: &[PlayEvent]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO spotify_tracks (song_name, artist_name, played_at, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in events {
            stmt.execute(params![e.song_name, e.artist_name, e.played_at, e.timestamp])?;
        }
    }
    tx.commit()?;
    Ok(events.len())
}

pub fn count_plays(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM spotify_tracks", [], |r| r.get(0))?;
    Ok(n)
}

/// Most recent plays first.
pub fn recent_plays(conn: &Connection, limit: usize) -> Result<Vec<PlayEvent>> {
    let mut stmt = conn.prepare(
        "SELECT song_name, artist_name, played_at, timestamp FROM spotify_tracks ORDER BY played_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |r| {
        Ok(PlayEvent {
            song_name: r.get(0)?,
            artist_name: r.get(1)?,
            played_at: r.get(2)?,
            timestamp: r.get(3)?,
        })
    })?;
    let mut v = Vec::new();
    for r in rows {
        v.push(r?);
    }
    Ok(v)
}
