//! Lazy chapter cache: read-through from the local store to the remote API.
//!
//! A chapter is fetched at most logically once — the marker row says "all
//! verses of this chapter are stored". Concurrent calls for the same
//! uncached chapter are not deduplicated here; the atomic upsert keyed by
//! verse id makes the duplicate fetch harmless.

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use daily_bread_api::{BIBLE_BOOKS, BookInfo, ChapterFetcher, Verse, find_book, total_chapters};

use crate::store::{CacheStats, CachedChapter, VerseIndex};

/// Read-through cache over the verse store and a [`ChapterFetcher`].
#[derive(Clone)]
pub struct ChapterCache {
    index: VerseIndex,
    fetcher: Arc<dyn ChapterFetcher>,
}

impl ChapterCache {
    pub fn new(index: VerseIndex, fetcher: Arc<dyn ChapterFetcher>) -> Self {
        Self { index, fetcher }
    }

    /// Verses of one chapter: from the store if cached, otherwise fetched,
    /// stored atomically with the marker, and returned. A failed or empty
    /// fetch yields an empty list and writes nothing.
    pub async fn chapter_verses(&self, book_abbr: &str, chapter: usize) -> Result<Vec<Verse>> {
        if let Some(marker) = self.index.get_cached_chapter(book_abbr, chapter).await? {
            return self.index.chapter_verses(&marker.book_name, chapter).await;
        }

        let Some(book) = find_book(book_abbr) else {
            return Ok(Vec::new());
        };

        let Some(verses) = self.fetcher.fetch_chapter(book_abbr, chapter).await? else {
            return Ok(Vec::new());
        };
        if verses.is_empty() {
            return Ok(Vec::new());
        }

        let marker = CachedChapter {
            id: CachedChapter::key(book_abbr, chapter),
            book_id: book_abbr.to_string(),
            book_name: book.name.to_string(),
            chapter,
            cached_at: Utc::now().timestamp_millis(),
            verse_count: verses.len(),
        };
        self.index.upsert_chapter(&marker, &verses).await?;
        info!(book = book.name, chapter, verses = verses.len(), "cached chapter");

        Ok(verses)
    }

    /// Every (book, chapter) pair without a marker, in canonical order.
    pub async fn uncached_pairs(&self) -> Result<Vec<(&'static BookInfo, usize)>> {
        let cached = self.index.cached_chapter_ids().await?;
        let mut uncached = Vec::new();
        for book in &BIBLE_BOOKS {
            for chapter in 1..=book.chapters {
                if !cached.contains(&CachedChapter::key(book.abbr, chapter)) {
                    uncached.push((book, chapter));
                }
            }
        }
        Ok(uncached)
    }

    /// Fetch one uniformly random uncached chapter. Returns its verses, or
    /// an empty list if everything is already cached or the fetch fails.
    pub async fn fetch_random_uncached(&self, rng: &mut impl Rng) -> Result<Vec<Verse>> {
        let uncached = self.uncached_pairs().await?;
        if uncached.is_empty() {
            debug!("all chapters cached, nothing to fetch");
            return Ok(Vec::new());
        }
        let (book, chapter) = uncached[rng.gen_range(0..uncached.len())];
        self.chapter_verses(book.abbr, chapter).await
    }

    /// Coverage counters: cached chapters, total chapters, cached verses.
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            cached_chapters: self.index.cached_chapter_count().await?,
            total_chapters: total_chapters(),
            cached_verses: self.index.verse_count().await?,
        })
    }

    /// The underlying verse store.
    pub fn index(&self) -> &VerseIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher that fabricates a fixed number of verses per chapter and
    /// counts calls; abbreviations in `fail` behave like exhausted retries.
    struct ScriptedFetcher {
        verses_per_chapter: usize,
        fail: HashSet<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(verses_per_chapter: usize) -> Self {
            Self {
                verses_per_chapter,
                fail: HashSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, abbrs: &[&'static str]) -> Self {
            self.fail = abbrs.iter().copied().collect();
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChapterFetcher for ScriptedFetcher {
        async fn fetch_chapter(
            &self,
            book_abbr: &str,
            chapter: usize,
        ) -> daily_bread_api::Result<Option<Vec<Verse>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(book_abbr) {
                return Ok(None);
            }
            let book = find_book(book_abbr).unwrap();
            Ok(Some(
                (1..=self.verses_per_chapter)
                    .map(|n| Verse {
                        id: format!("{}:{}:{}", book.abbr, chapter, n),
                        book: book.name.to_string(),
                        book_index: book.index,
                        chapter,
                        verse: n,
                        text: format!("{} {}:{}", book.name, chapter, n),
                        reference: format!("{} {}:{}", book.name, chapter, n),
                    })
                    .collect(),
            ))
        }
    }

    #[tokio::test]
    async fn miss_fetches_then_serves_from_cache() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(ScriptedFetcher::new(4));
        let cache = ChapterCache::new(index.clone(), fetcher.clone());

        let first = cache.chapter_verses("GEN", 1).await?;
        assert_eq!(first.len(), 4);
        assert_eq!(fetcher.call_count(), 1);
        assert!(index.has_chapter("GEN", 1).await?);

        let second = cache.chapter_verses("GEN", 1).await?;
        assert_eq!(second, first);
        // served from the store, no second fetch
        assert_eq!(fetcher.call_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(ScriptedFetcher::new(4).failing(&["GEN"]));
        let cache = ChapterCache::new(index.clone(), fetcher);

        assert!(cache.chapter_verses("GEN", 1).await?.is_empty());
        assert!(!index.has_chapter("GEN", 1).await?);
        assert_eq!(index.verse_count().await?, 0);

        // unknown book short-circuits the same way
        assert!(cache.chapter_verses("NOPE", 1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn random_uncached_fetch_caches_a_chapter() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(ScriptedFetcher::new(2));
        let cache = ChapterCache::new(index.clone(), fetcher);
        let mut rng = SmallRng::seed_from_u64(1);

        let verses = cache.fetch_random_uncached(&mut rng).await?;
        assert_eq!(verses.len(), 2);
        assert_eq!(index.cached_chapter_count().await?, 1);

        let stats = cache.cache_stats().await?;
        assert_eq!(stats.cached_chapters, 1);
        assert_eq!(stats.total_chapters, 1189);
        assert_eq!(stats.cached_verses, 2);

        Ok(())
    }
}
