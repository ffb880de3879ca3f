use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotify_history_sync as lib;
use lib::config::Config;
use lib::pipeline::RunOutcome;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "spotify-history-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the last window of plays and load them (one-shot)
    Run,
    /// Run once a day at daily_run_time (long-running)
    Daemon,
    /// Validate config file and exit
    ConfigValidate,
    /// Print the most recently stored plays
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Obtain a refresh token interactively
    Auth,
}

/// Explicit --config wins, then $SPOTIFY_HISTORY_CONFIG, then the user
/// config dir, then the repository example config.
fn resolve_config_path(explicit: Option<&PathBuf>) -> PathBuf {
    if let Some(p) = explicit {
        return p.clone();
    }
    if let Ok(p) = std::env::var("SPOTIFY_HISTORY_CONFIG") {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    if let Some(dir) = dirs::config_dir() {
        let user_path = dir.join("spotify-history-sync").join("config.toml");
        if user_path.exists() {
            return user_path;
        }
    }
    PathBuf::from("config/example-config.toml")
}

fn init_logging(log_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Bridge `log` records from the storage layer into tracing.
    let _ = LogTracer::init();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(log_dir, "spotify-history.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stdout));

    tracing_subscriber_global::set_global_default(subscriber)
        .context("setting global tracing subscriber")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_ref());

    let cfg = match Config::from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(e) if matches!(cli.command, Commands::ConfigValidate) => {
            eprintln!("Config validation failed: {:#}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e).with_context(|| format!("loading config from {}", config_path.display())),
    };

    if let Commands::ConfigValidate = cli.command {
        match cfg.validate() {
            Ok(()) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let _guard = init_logging(&cfg.log_dir)?;

    match cli.command {
        Commands::Run => {
            match lib::pipeline::run_pipeline_once(&cfg).await.context("running pipeline")? {
                RunOutcome::Skipped => println!("No plays in the window; nothing loaded."),
                RunOutcome::Loaded { fetched, stats } => println!(
                    "Fetched {} plays: {} inserted, {} already stored or rejected.",
                    fetched, stats.inserted, stats.skipped
                ),
            }
        }
        Commands::Daemon => {
            lib::schedule::run_daemon(&cfg).await.context("running scheduler")?;
        }
        Commands::History { limit } => {
            let conn = lib::db::open_or_create(&cfg.db_path)
                .with_context(|| format!("opening DB at {}", cfg.db_path.display()))?;
            let total = lib::db::count_plays(&conn)?;
            let plays = lib::db::recent_plays(&conn, limit)?;
            println!("{} plays stored; showing {}:", total, plays.len());
            for p in plays {
                println!("- {} | {} - {}", p.played_at, p.artist_name, p.song_name);
            }
        }
        Commands::Auth => {
            lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
        }
        Commands::ConfigValidate => {}
    }

    Ok(())
}
