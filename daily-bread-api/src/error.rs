//! Error types for the verse API client.

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error raised by a single fetch attempt or by a fetcher implementation.
///
/// [`BibleApiClient`](crate::client::BibleApiClient) retries transient
/// variants internally and reports exhaustion as `Ok(None)` rather than an
/// error, so these mostly surface through logs — but custom
/// [`ChapterFetcher`](crate::client::ChapterFetcher) implementations are
/// free to propagate them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("unexpected HTTP status {status} for {reference}")]
    Status { status: u16, reference: String },

    /// Response body was not the JSON document we expect
    #[error("malformed response for {reference}: {source}")]
    Decode {
        reference: String,
        #[source]
        source: serde_json::Error,
    },

    /// Generic errors from other libraries
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl ApiError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::External { .. })
    }
}
