use crate::config::Config;
use crate::pipeline::{self, RunOutcome};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tracing::{error, info};

/// Next instant strictly after `now` whose UTC wall-clock time is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the pipeline once a day at `daily_run_time` until Ctrl-C. Runs never
/// overlap; a missed slot is not caught up.
pub async fn run_daemon(cfg: &Config) -> Result<()> {
    cfg.validate()?;
    cfg.validate_credentials()?;
    let at = cfg.run_time()?;
    info!("Scheduler started; daily run at {} UTC", at.format("%H:%M"));

    loop {
        let now = Utc::now();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next run at {}", next.to_rfc3339());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C; stopping scheduler");
                break;
            }
        }

        match pipeline::run_pipeline_once(cfg).await {
            Ok(RunOutcome::Skipped) => info!("Run finished: nothing to load"),
            Ok(RunOutcome::Loaded { fetched, stats }) => info!(
                "Run finished: fetched {}, inserted {}, skipped {}",
                fetched, stats.inserted, stats.skipped
            ),
            Err(e) => error!("Run failed: {:#}", e),
        }
    }
    Ok(())
}
