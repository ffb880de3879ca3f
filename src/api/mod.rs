pub mod mock;
pub mod spotify;
pub mod spotify_auth;

use crate::models::{AccessToken, RecentlyPlayed};
use anyhow::Result;

/// Source of listening history: the two calls a pipeline run makes.
/// Implementations: spotify::SpotifyClient, mock::MockProvider.
#[async_trait::async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Exchange the long-lived refresh credential for an access token.
    async fn refresh_access_token(&self) -> Result<AccessToken>;

    /// Fetch one page of plays that happened after `after_ms` (unix millis).
    async fn recently_played(&self, token: &AccessToken, after_ms: i64, limit: u32) -> Result<RecentlyPlayed>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
