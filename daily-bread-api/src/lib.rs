//! # daily-bread-api
//!
//! Client for the bible-api.com verse API, plus the static book table the
//! rest of the system keys off. This crate owns the network edge of Daily
//! Bread: it issues one request per (book, chapter), retries transient
//! failures with linear backoff, and normalizes responses into [`Verse`]
//! records ready for the local cache.
//!
//! ## Quick start
//!
//! ```no_run
//! use daily_bread_api::{ApiConfig, BibleApiClient, ChapterFetcher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BibleApiClient::new(ApiConfig::default())?;
//! if let Some(verses) = client.fetch_chapter("JHN", 3).await? {
//!     println!("fetched {} verses, first: {}", verses.len(), verses[0].reference);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`books`]: static 66-book reference table (abbreviations, names,
//!   chapter counts, canonical order)
//! - [`client`]: the [`ChapterFetcher`] trait, the reqwest-backed
//!   [`BibleApiClient`], and verse normalization
//! - [`config`]: [`ApiConfig`] with endpoint, translation, and retry policy
//! - [`error`]: [`ApiError`] and the crate [`Result`] alias
//!
//! ## Failure model
//!
//! A fetch that exhausts its attempts, hits an unknown book abbreviation, or
//! receives an empty chapter resolves to `Ok(None)` — the caller adds
//! nothing to the cache and moves on. Errors only propagate from custom
//! [`ChapterFetcher`] implementations.

pub mod books;
pub mod client;
pub mod config;
pub mod error;

pub use books::{BIBLE_BOOKS, BookInfo, find_book, total_chapters};
pub use client::{BibleApiClient, ChapterFetcher, Verse};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
