//! Feed batch generation and the UI-facing operations.
//!
//! [`FeedEngine`] ties the stores, the chapter cache, and the sampler
//! together. Each call to [`generate_feed_batch`](FeedEngine::generate_feed_batch)
//! runs one linear pass:
//!
//! 1. **Warm-up** — below the chapter threshold, prefetch a diverse set of
//!    chapters and wait for it
//! 2. **Resurface** — verses liked before today come back as brand-new
//!    items; the liked rows are retired in place
//! 3. **Gap fill** — sample the remaining slots from cached verses not yet
//!    in the feed, fetching one extra random chapter if the pool runs short
//! 4. **Materialize** — persist the new items and bump each verse's history
//!
//! A failure partway through surfaces to the caller; state persisted by
//! earlier steps stays put.

use anyhow::Result;
use chrono::{Local, NaiveTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use daily_bread_api::{ChapterFetcher, Verse};

use super::chapter_cache::ChapterCache;
use super::prefetch::prefetch_chapters;
use super::sampler;
use crate::store::{CacheStats, Comment, FeedIndex, FeedItem};

/// Tuning knobs for the feed engine.
#[derive(Debug, Clone)]
pub struct FeedEngineConfig {
    /// Items per generated batch
    pub batch_size: usize,
    /// Prefetch runs while fewer chapters than this are cached
    pub prefetch_threshold: usize,
    /// Chapters the warm-up prefetch asks for
    pub prefetch_count: usize,
    /// Fixed RNG seed; `None` seeds from entropy
    pub rng_seed: Option<u64>,
}

impl Default for FeedEngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            prefetch_threshold: 5,
            prefetch_count: 5,
            rng_seed: None,
        }
    }
}

impl FeedEngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_prefetch_threshold(mut self, threshold: usize) -> Self {
        self.prefetch_threshold = threshold;
        self
    }

    pub fn with_prefetch_count(mut self, count: usize) -> Self {
        self.prefetch_count = count;
        self
    }

    /// Fix the random source for reproducible runs.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// A feed item joined with the verse it displays.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub item: FeedItem,
    pub verse: Verse,
}

/// The feed orchestrator. Holds the store handles and the random source;
/// construct one per session and pass it around explicitly.
pub struct FeedEngine {
    index: FeedIndex,
    cache: ChapterCache,
    config: FeedEngineConfig,
    rng: SmallRng,
}

impl FeedEngine {
    /// Open a persistent engine rooted at `base`.
    pub async fn new(
        base: &Path,
        fetcher: Arc<dyn ChapterFetcher>,
        config: FeedEngineConfig,
    ) -> Result<Self> {
        let index = FeedIndex::open(base).await?;
        Ok(Self::with_index(index, fetcher, config))
    }

    /// In-memory engine for tests.
    pub async fn new_memory(
        fetcher: Arc<dyn ChapterFetcher>,
        config: FeedEngineConfig,
    ) -> Result<Self> {
        let index = FeedIndex::open_memory().await?;
        Ok(Self::with_index(index, fetcher, config))
    }

    fn with_index(
        index: FeedIndex,
        fetcher: Arc<dyn ChapterFetcher>,
        config: FeedEngineConfig,
    ) -> Self {
        let cache = ChapterCache::new(index.verse_index().clone(), fetcher);
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            index,
            cache,
            config,
            rng,
        }
    }

    /// The underlying store, for read-side queries and tests.
    pub fn index(&self) -> &FeedIndex {
        &self.index
    }

    /// Generate one batch of feed entries: resurfaced likes first, then
    /// freshly sampled verses up to the configured batch size.
    pub async fn generate_feed_batch(&mut self) -> Result<Vec<FeedEntry>> {
        let now_millis = Utc::now().timestamp_millis();

        // 1. warm-up: make sure a minimally diverse pool exists
        let cached = self.index.cached_chapter_count().await?;
        if cached < self.config.prefetch_threshold {
            let fetched =
                prefetch_chapters(&self.cache, self.config.prefetch_count, &mut self.rng).await?;
            info!(cached, fetched, "warmed up cold cache");
        }

        // 2. resurface likes from previous days
        let today_start = start_of_today_millis();
        let mut batch = Vec::new();
        for item in self.index.liked_items().await? {
            let Some(liked_at) = item.liked_at else {
                continue;
            };
            if liked_at >= today_start {
                continue;
            }
            // The retired row stays in storage; its verse remains in the
            // exclusion set, which keeps the sampler from double-serving
            // the verse while the resurfaced copy is live.
            self.index.set_like(&item.id, false, None).await?;
            let Some(verse) = self.index.get_verse(&item.verse_id).await? else {
                continue;
            };
            let fresh = self.new_feed_item(&verse.id, now_millis);
            self.index.insert_feed_item(&fresh).await?;
            debug!(verse = %verse.reference, "resurfacing liked verse");
            batch.push(FeedEntry { item: fresh, verse });
        }

        // 3. gap fill
        let remaining = self.config.batch_size.saturating_sub(batch.len());
        if remaining == 0 {
            return Ok(batch);
        }

        let excluded = self.index.feed_verse_ids().await?;
        let mut pool: Vec<Verse> = self
            .index
            .all_verses()
            .await?
            .into_iter()
            .filter(|verse| !excluded.contains(&verse.id))
            .collect();
        if pool.len() < remaining {
            let extra = self.cache.fetch_random_uncached(&mut self.rng).await?;
            pool.extend(extra.into_iter().filter(|verse| !excluded.contains(&verse.id)));
        }

        let history = self.index.history_map().await?;
        let sampled = sampler::sample(pool, remaining, &history, now_millis, &mut self.rng);

        // 4. materialize
        for verse in sampled {
            let item = self.new_feed_item(&verse.id, now_millis);
            self.index.insert_feed_item(&item).await?;
            self.index.bump_history(&verse.id, now_millis).await?;
            batch.push(FeedEntry { item, verse });
        }

        info!(entries = batch.len(), "generated feed batch");
        Ok(batch)
    }

    /// Flip a feed item's like state. Unknown ids are ignored.
    pub async fn toggle_like(&self, feed_item_id: &str) -> Result<()> {
        let Some(item) = self.index.get_feed_item(feed_item_id).await? else {
            return Ok(());
        };
        if item.liked {
            self.index.set_like(feed_item_id, false, None).await?;
        } else {
            let now_millis = Utc::now().timestamp_millis();
            self.index.set_like(feed_item_id, true, Some(now_millis)).await?;
        }
        Ok(())
    }

    /// Hide a feed item from the visible feed.
    pub async fn hide_feed_item(&self, feed_item_id: &str) -> Result<()> {
        self.index.set_hidden(feed_item_id, true).await
    }

    /// Add a comment, optionally as a reply to `parent_id`.
    pub async fn add_comment(
        &self,
        feed_item_id: &str,
        text: &str,
        parent_id: Option<String>,
    ) -> Result<Comment> {
        let now_millis = Utc::now().timestamp_millis();
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            feed_item_id: feed_item_id.to_string(),
            parent_id,
            text: text.trim().to_string(),
            created_at: now_millis,
            updated_at: now_millis,
        };
        self.index.insert_comment(&comment).await?;
        Ok(comment)
    }

    /// Delete a comment and its whole reply subtree.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<usize> {
        self.index.delete_comment_tree(comment_id).await
    }

    /// All comments on one feed item, oldest first.
    pub async fn comments(&self, feed_item_id: &str) -> Result<Vec<Comment>> {
        self.index.comments_for_item(feed_item_id).await
    }

    /// The visible feed: non-hidden items in display order, joined with
    /// their verses. Items whose verse is missing are skipped.
    pub async fn visible_feed(&self) -> Result<Vec<FeedEntry>> {
        let mut entries = Vec::new();
        for item in self.index.visible_items().await? {
            if let Some(verse) = self.index.get_verse(&item.verse_id).await? {
                entries.push(FeedEntry { item, verse });
            }
        }
        Ok(entries)
    }

    /// Cache coverage counters.
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.cache_stats().await
    }

    fn new_feed_item(&mut self, verse_id: &str, now_millis: i64) -> FeedItem {
        use rand::Rng;
        FeedItem {
            id: Uuid::new_v4().to_string(),
            verse_id: verse_id.to_string(),
            liked: false,
            liked_at: None,
            hidden: false,
            shown_at: now_millis,
            // display order: arrival time, randomly perturbed to break ties
            order: now_millis as f64 + self.rng.r#gen::<f64>(),
        }
    }
}

/// Millisecond timestamp of local midnight today. Likes from before this
/// instant are eligible for resurfacing.
pub(crate) fn start_of_today_millis() -> i64 {
    let now = Local::now();
    now.with_time(NaiveTime::MIN)
        .single()
        .unwrap_or(now)
        .timestamp_millis()
}
