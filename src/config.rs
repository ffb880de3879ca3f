use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How validated plays are written to the `spotify_tracks` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// `INSERT OR IGNORE` per row; collisions are skipped individually.
    #[default]
    IgnoreConflicts,
    /// One all-or-nothing append. A single collision rejects the whole batch.
    AtomicAppend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Credentials. Prefer env vars over putting these in the file.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Pre-encoded Base64 of `client_id:client_secret`; used when the
    /// id/secret pair is not set.
    #[serde(default)]
    pub basic_auth: Option<String>,
    #[serde(default)]
    pub refresh_token: String,

    // Endpoints
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    // Fetch window
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default)]
    pub load_mode: LoadMode,

    /// UTC wall-clock time (HH:MM) the daemon fires at.
    #[serde(default = "default_daily_run_time")]
    pub daily_run_time: String,

    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Spotify caps the recently-played page size at 50.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Longest accepted fetch window (one year).
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 365;

fn default_auth_base() -> String { "https://accounts.spotify.com".into() }
fn default_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_redirect_uri() -> String { "http://127.0.0.1:8888/".into() }
fn default_lookback_hours() -> u32 { 24 }
fn default_page_limit() -> u32 { MAX_PAGE_LIMIT }
fn default_http_timeout() -> u64 { 10 }
fn default_daily_run_time() -> String { "21:00".into() }
fn default_db_path() -> PathBuf { "spotify_tracks.sqlite".into() }
fn default_log_dir() -> PathBuf { "logs".into() }

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            basic_auth: None,
            refresh_token: String::new(),
            auth_base: default_auth_base(),
            api_base: default_api_base(),
            redirect_uri: default_redirect_uri(),
            lookback_hours: default_lookback_hours(),
            page_limit: default_page_limit(),
            http_timeout_secs: default_http_timeout(),
            accept_invalid_certs: false,
            load_mode: LoadMode::default(),
            daily_run_time: default_daily_run_time(),
            db_path: default_db_path(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load a config file, resolve relative paths against its directory and
    /// apply `SPOTIFY_*` environment overrides.
    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&s)?;
        if let Some(dir) = path.parent() {
            cfg.resolve_relative_paths(dir);
        }
        cfg.apply_env_overrides_from(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if self.db_path.is_relative() {
            self.db_path = base.join(&self.db_path);
        }
        if self.log_dir.is_relative() {
            self.log_dir = base.join(&self.log_dir);
        }
    }

    /// Non-empty values returned by `lookup` replace the file's secrets.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("SPOTIFY_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = get("SPOTIFY_CLIENT_SECRET") {
            self.client_secret = v;
        }
        if let Some(v) = get("SPOTIFY_BASIC_AUTH") {
            self.basic_auth = Some(v);
        }
        if let Some(v) = get("SPOTIFY_REFRESH_TOKEN") {
            self.refresh_token = v;
        }
    }

    /// Structural checks that apply to every command.
    pub fn validate(&self) -> Result<()> {
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(anyhow!(
                "page_limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT,
                self.page_limit
            ));
        }
        if self.lookback_hours == 0 || self.lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(anyhow!(
                "lookback_hours must be between 1 and {}, got {}",
                MAX_LOOKBACK_HOURS,
                self.lookback_hours
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be greater than zero"));
        }
        self.run_time()?;
        Ok(())
    }

    /// Checks needed before talking to Spotify.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.refresh_token.trim().is_empty() {
            return Err(anyhow!(
                "no refresh_token configured (set it in the config or SPOTIFY_REFRESH_TOKEN)"
            ));
        }
        if self.basic_auth_value().is_none() {
            return Err(anyhow!(
                "no client credentials configured (client_id/client_secret or basic_auth)"
            ));
        }
        Ok(())
    }

    /// The Base64 `client_id:client_secret` blob for the token endpoint.
    pub fn basic_auth_value(&self) -> Option<String> {
        use base64::{engine::general_purpose, Engine as _};

        if !self.client_id.is_empty() && !self.client_secret.is_empty() {
            return Some(
                general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret)),
            );
        }
        self.basic_auth
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn run_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_run_time.trim(), "%H:%M")
            .with_context(|| format!("invalid daily_run_time '{}', expected HH:MM", self.daily_run_time))
    }
}
