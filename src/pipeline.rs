use crate::api::{spotify::SpotifyClient, HistoryProvider};
use crate::config::{Config, LoadMode};
use crate::db::{self, LoadStats};
use crate::models::PlayEvent;
use crate::transform::{self, Validation};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No plays in the window; storage was not touched.
    Skipped,
    Loaded { fetched: usize, stats: LoadStats },
}

/// Lower bound for the fetch window, whole seconds expressed in millis.
pub fn window_start_ms(now: DateTime<Utc>, lookback_hours: u32) -> Result<i64> {
    let start = now
        .checked_sub_signed(Duration::hours(i64::from(lookback_hours)))
        .ok_or_else(|| anyhow!("lookback of {}h from {} is out of range", lookback_hours, now.to_rfc3339()))?;
    Ok(start.timestamp() * 1000)
}

/// Only one page is requested, so a full page means older plays inside the
/// window may be missing.
pub fn page_may_be_truncated(items: usize, limit: u32) -> bool {
    items >= limit as usize
}

/// One scheduled run against the real Spotify API.
pub async fn run_pipeline_once(cfg: &Config) -> Result<RunOutcome> {
    cfg.validate()?;
    let provider = SpotifyClient::from_config(cfg)?;
    run_with_provider(cfg, &provider, Utc::now()).await
}

/// Authenticate, fetch, shape, validate and load, in that order. The first
/// fatal error aborts the run before anything is written.
pub async fn run_with_provider(cfg: &Config, provider: &dyn HistoryProvider, now: DateTime<Utc>) -> Result<RunOutcome> {
    let span = tracing::info_span!("pipeline_run", run_id = %Uuid::new_v4(), provider = provider.name());
    run_inner(cfg, provider, now).instrument(span).await
}

async fn run_inner(cfg: &Config, provider: &dyn HistoryProvider, now: DateTime<Utc>) -> Result<RunOutcome> {
    let token = provider
        .refresh_access_token()
        .await
        .context("refreshing access token")?;

    let after_ms = window_start_ms(now, cfg.lookback_hours)?;
    let page = provider
        .recently_played(&token, after_ms, cfg.page_limit)
        .await
        .context("fetching recently played tracks")?;
    drop(token);

    if page_may_be_truncated(page.items.len(), cfg.page_limit) {
        warn!(
            "Received a full page of {} plays; plays older than these within the last {}h were not fetched",
            page.items.len(),
            cfg.lookback_hours
        );
    }

    let batch = transform::shape(&page).context("shaping recently played response")?;
    info!("Shaped {} plays since {}", batch.len(), after_ms);
    for r in batch.records() {
        debug!(
            "{} | {} | {} | {}",
            r.song_name.as_deref().unwrap_or("<null>"),
            r.artist_name.as_deref().unwrap_or("<null>"),
            r.played_at.as_deref().unwrap_or("<null>"),
            r.timestamp.as_deref().unwrap_or("<null>")
        );
    }

    let events = match transform::validate(&batch).context("validating plays")? {
        Validation::Empty => {
            info!("No songs downloaded. Finishing execution");
            return Ok(RunOutcome::Skipped);
        }
        Validation::Valid(events) => events,
    };
    info!("Data valid, proceed to load stage");

    let fetched = events.len();
    let stats = persist(cfg, events).await?;
    info!(
        "Load finished: {} inserted, {} skipped",
        stats.inserted, stats.skipped
    );
    Ok(RunOutcome::Loaded { fetched, stats })
}

async fn persist(cfg: &Config, events: Vec<PlayEvent>) -> Result<LoadStats> {
    let db_path = cfg.db_path.clone();
    let mode = cfg.load_mode;
    tokio::task::spawn_blocking(move || -> Result<LoadStats> {
        let path_display = db_path.display().to_string();
        let mut conn = db::open_or_create(&db_path)
            .with_context(|| format!("opening DB at {}", path_display))?;
        let stats = match mode {
            LoadMode::IgnoreConflicts => db::insert_ignore_conflicts(&mut conn, &events)
                .with_context(|| format!("inserting plays into {}", path_display))?,
            LoadMode::AtomicAppend => match db::append_atomic(&mut conn, &events) {
                Ok(n) => LoadStats { inserted: n, skipped: 0 },
                Err(e) => {
                    // Whole batch rejected, including rows that did not collide.
                    log::warn!(
                        "Append rejected ({}); plays from this window likely exist in the database already. {} rows dropped",
                        e,
                        events.len()
                    );
                    LoadStats { inserted: 0, skipped: events.len() }
                }
            },
        };
        drop(conn);
        log::info!("Closed database {}", path_display);
        Ok(stats)
    })
    .await?
}
