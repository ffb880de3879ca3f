use super::HistoryProvider;
use crate::config::Config;
use crate::models::{AccessToken, RecentlyPlayed};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Spotify Web API client for one pipeline run.
pub struct SpotifyClient {
    client: Client,
    auth_base: String,
    api_base: String,
    basic_auth: String,
    refresh_token: String,
}

/// Build the HTTP client used for a run. Certificate checks stay on unless
/// this particular client is configured otherwise.
pub fn build_http_client(timeout_secs: u64, accept_invalid_certs: bool) -> Result<Client> {
    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled for the Spotify client");
    }
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .context("building HTTP client")
}

impl SpotifyClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        cfg.validate_credentials()?;
        let basic_auth = cfg
            .basic_auth_value()
            .ok_or_else(|| anyhow!("no client credentials configured"))?;
        Ok(Self {
            client: build_http_client(cfg.http_timeout_secs, cfg.accept_invalid_certs)?,
            auth_base: cfg.auth_base.trim_end_matches('/').to_string(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            basic_auth,
            refresh_token: cfg.refresh_token.clone(),
        })
    }
}

#[async_trait]
impl HistoryProvider for SpotifyClient {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn refresh_access_token(&self) -> Result<AccessToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
        ];
        let url = format!("{}/api/token", self.auth_base);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Basic {}", self.basic_auth))
            .form(&params)
            .send()
            .await
            .context("token refresh request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to refresh token: {} - {}", status, body));
        }
        let tr: TokenResponse = resp.json().await.context("parsing token response")?;
        let token = tr
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("token response has no access_token"))?;
        debug!("Obtained Spotify access token");
        Ok(AccessToken::new(token))
    }

    async fn recently_played(&self, token: &AccessToken, after_ms: i64, limit: u32) -> Result<RecentlyPlayed> {
        let url = format!("{}/me/player/recently-played", self.api_base);
        let resp = self
            .client
            .get(&url)
            .header(AUTHORIZATION, token.bearer())
            .query(&[("after", after_ms.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("recently-played request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("recently-played failed: {} - {}", status, body));
        }
        let page: RecentlyPlayed = resp.json().await.context("parsing recently-played response")?;
        debug!("Fetched {} plays after {}", page.items.len(), after_ms);
        Ok(page)
    }
}
