use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

/// Manual OAuth helper for obtaining the refresh token the pipeline needs:
/// 1. Build the Spotify authorization URL and print it.
/// 2. User approves in a browser and is redirected to the redirect URI.
/// 3. User pastes the full redirect URL back here.
/// 4. The `code` param is exchanged for tokens and the refresh token is printed.
///
/// Nothing is written to disk; the user copies the refresh token into the
/// config file or `SPOTIFY_REFRESH_TOKEN`.
#[derive(Deserialize)]
struct TokenResponse {
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub const SCOPE: &str = "user-read-recently-played";

pub fn authorize_url(cfg: &Config) -> Result<Url> {
    if cfg.client_id.is_empty() {
        return Err(anyhow!("client_id must be configured to build the authorize URL"));
    }
    let mut url = Url::parse(&format!("{}/authorize", cfg.auth_base.trim_end_matches('/')))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &cfg.client_id)
        .append_pair("scope", SCOPE)
        .append_pair("redirect_uri", &cfg.redirect_uri)
        .append_pair("show_dialog", "true");
    Ok(url)
}

pub fn code_from_redirect(redirect: &str) -> Result<String> {
    let parsed = Url::parse(redirect.trim()).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(anyhow!("authorization denied: {}", err));
    }
    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_else(|| anyhow!("no code in redirect URL"))?
        .1
        .into_owned())
}

/// Exchange an authorization code for a refresh token.
pub async fn exchange_code(cfg: &Config, code: &str) -> Result<String> {
    let basic = cfg
        .basic_auth_value()
        .ok_or_else(|| anyhow!("no client credentials configured"))?;
    let client = super::spotify::build_http_client(cfg.http_timeout_secs, cfg.accept_invalid_certs)?;
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", cfg.redirect_uri.as_str()),
    ];
    let resp = client
        .post(format!("{}/api/token", cfg.auth_base.trim_end_matches('/')))
        .header(AUTHORIZATION, format!("Basic {}", basic))
        .form(&params)
        .send()
        .await
        .context("token exchange request")?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }
    let tr: TokenResponse = resp.json().await?;
    if let Some(scope) = &tr.scope {
        if !scope.split(' ').any(|s| s == SCOPE) {
            tracing::warn!("granted scope '{}' does not include {}", scope, SCOPE);
        }
    }
    tr.refresh_token
        .ok_or_else(|| anyhow!("token exchange returned no refresh_token"))
}

pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    let url = authorize_url(cfg)?;
    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing, you'll be redirected to your redirect URI. Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let code = code_from_redirect(&input)?;

    let refresh_token = exchange_code(cfg, &code).await?;
    println!("\nRefresh token:\n\n{}\n", refresh_token);
    println!("Set it as refresh_token in the config file or export SPOTIFY_REFRESH_TOKEN.");
    Ok(())
}
