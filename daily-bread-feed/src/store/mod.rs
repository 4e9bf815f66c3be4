//! Persistence layer for the verse cache and the feed.
//!
//! Two SQLite-backed indexes share one connection pool:
//!
//! - **[`VerseIndex`]**: the append-only verse cache — `verses` plus
//!   `cached_chapters` marker rows, written atomically so a reader never
//!   sees a marker without its verses
//! - **[`FeedIndex`]**: everything that changes as the user scrolls —
//!   `feed_items`, `verse_history`, and threaded `comments`; wraps a
//!   [`VerseIndex`] and derefs to it
//!
//! All timestamps are stored as unix milliseconds (INTEGER columns);
//! calendar arithmetic happens at the call sites with chrono.

use serde::{Deserialize, Serialize};

pub mod feed_index;
pub mod verse_index;

pub use feed_index::FeedIndex;
pub use verse_index::VerseIndex;

/// Marker row asserting that every verse of a chapter is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChapter {
    /// Composite key: `GEN:1`
    pub id: String,
    /// Book abbreviation
    pub book_id: String,
    /// Book full name (the `verses.book` column joins on this)
    pub book_name: String,
    /// Chapter number
    pub chapter: usize,
    /// When this chapter was cached, unix millis
    pub cached_at: i64,
    /// Number of verses stored with the marker
    pub verse_count: usize,
}

impl CachedChapter {
    /// Marker key for a (book, chapter) pair.
    pub fn key(book_abbr: &str, chapter: usize) -> String {
        format!("{book_abbr}:{chapter}")
    }
}

/// A materialized feed entry — one verse "post" in the scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// UUID
    pub id: String,
    /// Verse this item displays
    pub verse_id: String,
    pub liked: bool,
    /// Set iff `liked`; drives next-day resurfacing
    pub liked_at: Option<i64>,
    pub hidden: bool,
    /// When this item was generated, unix millis
    pub shown_at: i64,
    /// Feed sort key: `shown_at` millis plus a random fraction
    pub order: f64,
}

/// Per-verse display history, used only to compute sampling weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseHistory {
    pub verse_id: String,
    /// Most recent showing, unix millis
    pub last_seen_at: i64,
    /// Times ever shown; monotonically increasing
    pub seen_count: u32,
}

/// A threaded comment on a feed item. `parent_id = None` means top-level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// UUID
    pub id: String,
    pub feed_item_id: String,
    pub parent_id: Option<String>,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Cache coverage counters for the credits panel / `stats` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub cached_chapters: usize,
    pub total_chapters: usize,
    pub cached_verses: usize,
}
