//! HTTP client for bible-api.com and verse normalization.
//!
//! One GET per (book, chapter), retried up to
//! [`ApiConfig::max_attempts`](crate::config::ApiConfig) times with linear
//! backoff. Responses are normalized into [`Verse`] records: whitespace runs
//! collapsed to single spaces, ids of the form `ABBR:chapter:verse`, and a
//! human-readable reference built from the full book name.
//!
//! The [`ChapterFetcher`] trait is the seam consumers program against;
//! tests substitute scripted implementations for the real client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::books::{BookInfo, find_book};
use crate::config::ApiConfig;
use crate::error::{ApiError, Result};

/// A single Bible verse, normalized and ready for storage.
///
/// Immutable once created; the verse cache is append-only and keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    /// Composite natural key: `GEN:1:1`
    pub id: String,
    /// Full book name: `Genesis`
    pub book: String,
    /// Canonical book position, 0 through 65
    pub book_index: usize,
    /// Chapter number, 1-indexed
    pub chapter: usize,
    /// Verse number, 1-indexed
    pub verse: usize,
    /// Normalized verse text
    pub text: String,
    /// Human-readable reference: `Genesis 1:1`
    pub reference: String,
}

/// Raw verse entry as returned by bible-api.com.
#[derive(Debug, Deserialize)]
struct RawVerse {
    chapter: usize,
    verse: usize,
    text: String,
}

/// Raw chapter document as returned by bible-api.com.
#[derive(Debug, Deserialize)]
struct ChapterResponse {
    #[serde(default)]
    verses: Vec<RawVerse>,
}

/// Source of chapter data.
///
/// `Ok(None)` means "nothing to fetch": the book is unknown, the chapter is
/// empty, or every attempt failed. Callers treat all three the same way and
/// add nothing to the cache.
#[async_trait]
pub trait ChapterFetcher: Send + Sync {
    async fn fetch_chapter(&self, book_abbr: &str, chapter: usize) -> Result<Option<Vec<Verse>>>;
}

/// Client for the bible-api.com chapter endpoint.
#[derive(Debug, Clone)]
pub struct BibleApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl BibleApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn chapter_url(&self, book_abbr: &str, chapter: usize) -> String {
        format!(
            "{}/{}+{}?translation={}",
            self.config.base_url, book_abbr, chapter, self.config.translation
        )
    }

    /// One HTTP attempt: GET, status check, JSON decode.
    async fn attempt(&self, url: &str, reference: &str) -> Result<ChapterResponse> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reference: reference.to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            reference: reference.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ChapterFetcher for BibleApiClient {
    async fn fetch_chapter(&self, book_abbr: &str, chapter: usize) -> Result<Option<Vec<Verse>>> {
        // Unknown abbreviation is settled locally, no request is made.
        let Some(book) = find_book(book_abbr) else {
            warn!(book_abbr, "unknown book abbreviation, skipping fetch");
            return Ok(None);
        };

        let url = self.chapter_url(book_abbr, chapter);
        let reference = format!("{} {}", book.name, chapter);

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(&url, &reference).await {
                Ok(response) => {
                    if response.verses.is_empty() {
                        debug!(%reference, "chapter came back empty");
                        return Ok(None);
                    }
                    return Ok(Some(normalize_verses(book, response.verses)));
                }
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    warn!(%reference, attempt, error = %err, "chapter fetch failed, retrying");
                    tokio::time::sleep(self.config.base_backoff * attempt as u32).await;
                }
                Err(err) => {
                    warn!(%reference, attempt, error = %err, "chapter fetch failed, giving up");
                    return Ok(None);
                }
            }
        }

        Ok(None)
    }
}

/// Turn raw API entries into stored [`Verse`] records.
fn normalize_verses(book: &'static BookInfo, raw: Vec<RawVerse>) -> Vec<Verse> {
    raw.into_iter()
        .map(|v| Verse {
            id: format!("{}:{}:{}", book.abbr, v.chapter, v.verse),
            book: book.name.to_string(),
            book_index: book.index,
            chapter: v.chapter,
            verse: v.verse,
            text: normalize_text(&v.text),
            reference: format!("{} {}:{}", book.name, v.chapter, v.verse),
        })
        .collect()
}

/// Collapse whitespace runs (including embedded newlines) to single spaces
/// and trim the ends.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_normalization_strips_newlines() {
        assert_eq!(
            normalize_text("In the beginning\nGod created\n  the heavens "),
            "In the beginning God created the heavens"
        );
        assert_eq!(normalize_text("  \n \n "), "");
    }

    #[test]
    fn normalization_builds_ids_and_references() {
        let book = find_book("GEN").unwrap();
        let verses = normalize_verses(
            book,
            vec![RawVerse {
                chapter: 1,
                verse: 3,
                text: "God said,\n\"Let there be light,\"\nand there was light.".to_string(),
            }],
        );
        assert_eq!(verses.len(), 1);
        let v = &verses[0];
        assert_eq!(v.id, "GEN:1:3");
        assert_eq!(v.book, "Genesis");
        assert_eq!(v.book_index, 0);
        assert_eq!(v.reference, "Genesis 1:3");
        assert_eq!(v.text, "God said, \"Let there be light,\" and there was light.");
    }

    #[test]
    fn response_without_verses_field_decodes_empty() {
        let response: ChapterResponse = serde_json::from_str("{}").unwrap();
        assert!(response.verses.is_empty());
    }

    #[tokio::test]
    async fn unknown_book_is_settled_without_a_request() {
        // Unroutable base URL: if the client tried the network this would
        // hang until the timeout instead of returning immediately.
        let client = BibleApiClient::new(
            ApiConfig::default().with_base_url("http://192.0.2.1:1"),
        )
        .unwrap();
        let fetched = client.fetch_chapter("NOPE", 1).await.unwrap();
        assert!(fetched.is_none());
    }
}
