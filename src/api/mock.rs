use super::HistoryProvider;
use crate::models::{AccessToken, RecentlyPlayed};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

/// In-memory provider used in tests and dry runs. Returns a canned page and
/// records the `(after_ms, limit)` of each fetch.
pub struct MockProvider {
    page: RecentlyPlayed,
    fail_auth: bool,
    calls: Mutex<Vec<(i64, u32)>>,
}

impl MockProvider {
    pub fn new(page: RecentlyPlayed) -> Self {
        Self { page, fail_auth: false, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing_auth() -> Self {
        Self {
            page: RecentlyPlayed { items: Vec::new(), next: None },
            fail_auth: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_calls(&self) -> Vec<(i64, u32)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HistoryProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn refresh_access_token(&self) -> Result<AccessToken> {
        if self.fail_auth {
            return Err(anyhow!("Failed to refresh token: mock auth failure"));
        }
        Ok(AccessToken::new("mock-access-token"))
    }

    async fn recently_played(&self, _token: &AccessToken, after_ms: i64, limit: u32) -> Result<RecentlyPlayed> {
        info!("MockProvider: recently_played after={} limit={}", after_ms, limit);
        if let Ok(mut c) = self.calls.lock() {
            c.push((after_ms, limit));
        }
        Ok(self.page.clone())
    }
}
