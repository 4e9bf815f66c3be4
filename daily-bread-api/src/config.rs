//! Configuration for the bible-api.com client.

use std::time::Duration;

/// Configuration for [`BibleApiClient`](crate::client::BibleApiClient).
///
/// The defaults match the public bible-api.com endpoint with the World
/// English Bible translation and the retry policy the feed expects: three
/// attempts per chapter with linearly increasing backoff.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the verse API, without a trailing slash
    pub base_url: String,
    /// Translation identifier passed on every request
    pub translation: String,
    /// Total attempts per chapter fetch, including the first
    pub max_attempts: usize,
    /// Backoff unit; attempt `n` (1-based) waits `n × base_backoff` before
    /// the next attempt
    pub base_backoff: Duration,
    /// Timeout applied to each individual HTTP request
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bible-api.com".to_string(),
            translation: "web".to_string(),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ApiConfig {
    /// Point the client at a different endpoint (used by tests and mirrors).
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Select a different translation.
    pub fn with_translation<S: Into<String>>(mut self, translation: S) -> Self {
        self.translation = translation.into();
        self
    }

    /// Override the total number of attempts per fetch.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the backoff unit between attempts.
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }
}
