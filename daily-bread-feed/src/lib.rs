//! daily-bread-feed: local-first verse feed engine
//!
//! This crate turns the lazily populated verse cache into a randomized,
//! de-duplicated, recency-de-boosted scrolling feed with likes, hides, and
//! threaded comments. Everything persists in a single SQLite database; the
//! network edge lives in the companion `daily-bread-api` crate behind the
//! [`ChapterFetcher`](daily_bread_api::ChapterFetcher) seam.
//!
//! ## Key Modules
//!
//! - **[`feed`]**: chapter cache, cold-start prefetch, weighted sampling,
//!   and the [`FeedEngine`](feed::FeedEngine) batch orchestrator
//! - **[`store`]**: SQLite persistence — verse cache, feed items, verse
//!   history, comments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daily_bread_api::{ApiConfig, BibleApiClient};
//! use daily_bread_feed::feed::{FeedEngine, FeedEngineConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = Arc::new(BibleApiClient::new(ApiConfig::default())?);
//! let mut engine =
//!     FeedEngine::new(Path::new("."), fetcher, FeedEngineConfig::default()).await?;
//! for entry in engine.generate_feed_batch().await? {
//!     println!("{} — {}", entry.verse.reference, entry.verse.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! bible-api.com → ChapterFetcher → ChapterCache → SQLite (verses + markers)
//!                                       ↓
//! UI ← feed batches ← FeedEngine ← Sampler ← VerseHistory
//!                         ↓
//!              feed items / comments (SQLite)
//! ```

pub mod feed;
pub mod store;
