//! Cold-start prefetch: seed the cache with chapters from distinct books.
//!
//! A brand-new install has nothing to sample from, and fetching five
//! chapters of Genesis would make a monotone feed. The strategy picks one
//! random chapter from each of `target` randomly chosen books, fills any
//! shortfall from the remaining uncached pairs, and fetches everything
//! concurrently. Failures are isolated per chapter.

use anyhow::Result;
use futures::future::join_all;
use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use super::chapter_cache::ChapterCache;

/// Fetch up to `target` uncached chapters, favoring distinct books.
/// Returns the number of picks that yielded at least one verse.
pub async fn prefetch_chapters(
    cache: &ChapterCache,
    target: usize,
    rng: &mut impl Rng,
) -> Result<usize> {
    let uncached = cache.uncached_pairs().await?;
    if target == 0 || uncached.is_empty() {
        return Ok(0);
    }

    let by_book: std::collections::HashMap<&'static str, Vec<usize>> = uncached
        .iter()
        .map(|(book, chapter)| (book.abbr, *chapter))
        .into_group_map();

    // Sort before shuffling: map iteration order must not leak into the
    // pick sequence, or seeded runs stop being reproducible.
    let mut books: Vec<&'static str> = by_book.keys().copied().collect();
    books.sort_unstable();
    books.shuffle(rng);

    let mut picks: Vec<(&'static str, usize)> = Vec::with_capacity(target);
    for abbr in books.iter().copied().take(target) {
        let chapters = &by_book[abbr];
        picks.push((abbr, chapters[rng.gen_range(0..chapters.len())]));
    }

    // Fewer distinct books than requested: top up from whatever uncached
    // pairs the round-robin pass did not take.
    if picks.len() < target {
        let mut leftover: Vec<(&'static str, usize)> = uncached
            .iter()
            .map(|(book, chapter)| (book.abbr, *chapter))
            .filter(|pair| !picks.contains(pair))
            .collect();
        leftover.shuffle(rng);
        let shortfall = target - picks.len();
        picks.extend(leftover.into_iter().take(shortfall));
    }

    let outcomes = join_all(
        picks
            .iter()
            .map(|(abbr, chapter)| cache.chapter_verses(abbr, *chapter)),
    )
    .await;

    let fetched = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Ok(verses) if !verses.is_empty()))
        .count();
    info!(requested = picks.len(), fetched, "prefetch complete");
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CachedChapter, VerseIndex};
    use async_trait::async_trait;
    use daily_bread_api::{BIBLE_BOOKS, ChapterFetcher, Verse, find_book};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Fetcher that logs every request and can fail per-book.
    struct LoggingFetcher {
        fail: HashSet<&'static str>,
        log: Mutex<Vec<(String, usize)>>,
    }

    impl LoggingFetcher {
        fn new() -> Self {
            Self {
                fail: HashSet::new(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, abbrs: &[&'static str]) -> Self {
            self.fail = abbrs.iter().copied().collect();
            self
        }

        fn requests(&self) -> Vec<(String, usize)> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChapterFetcher for LoggingFetcher {
        async fn fetch_chapter(
            &self,
            book_abbr: &str,
            chapter: usize,
        ) -> daily_bread_api::Result<Option<Vec<Verse>>> {
            self.log.lock().unwrap().push((book_abbr.to_string(), chapter));
            if self.fail.contains(book_abbr) {
                return Ok(None);
            }
            let book = find_book(book_abbr).unwrap();
            Ok(Some(vec![Verse {
                id: format!("{}:{}:1", book.abbr, chapter),
                book: book.name.to_string(),
                book_index: book.index,
                chapter,
                verse: 1,
                text: "text".to_string(),
                reference: format!("{} {}:1", book.name, chapter),
            }]))
        }
    }

    /// Mark every chapter cached except the given (abbr, chapter) pairs.
    async fn cache_all_except(index: &VerseIndex, keep: &[(&str, usize)]) -> Result<()> {
        for book in &BIBLE_BOOKS {
            for chapter in 1..=book.chapters {
                if keep.contains(&(book.abbr, chapter)) {
                    continue;
                }
                let marker = CachedChapter {
                    id: CachedChapter::key(book.abbr, chapter),
                    book_id: book.abbr.to_string(),
                    book_name: book.name.to_string(),
                    chapter,
                    cached_at: 0,
                    verse_count: 0,
                };
                index.upsert_chapter(&marker, &[]).await?;
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn cold_start_picks_distinct_books() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(LoggingFetcher::new());
        let cache = ChapterCache::new(index.clone(), fetcher.clone());
        let mut rng = SmallRng::seed_from_u64(42);

        let fetched = prefetch_chapters(&cache, 5, &mut rng).await?;
        assert_eq!(fetched, 5);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 5);
        let distinct_books: HashSet<&str> =
            requests.iter().map(|(abbr, _)| abbr.as_str()).collect();
        assert_eq!(distinct_books.len(), 5, "picks must span distinct books");
        assert_eq!(index.cached_chapter_count().await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn shortfall_filled_from_leftover_pairs() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(LoggingFetcher::new());
        let cache = ChapterCache::new(index.clone(), fetcher.clone());
        let mut rng = SmallRng::seed_from_u64(9);

        // Only two distinct books remain uncached, three pairs total.
        cache_all_except(&index, &[("HAG", 1), ("HAG", 2), ("JUD", 1)]).await?;

        let fetched = prefetch_chapters(&cache, 3, &mut rng).await?;
        assert_eq!(fetched, 3);

        let requested: HashSet<(String, usize)> = fetcher.requests().into_iter().collect();
        let expected: HashSet<(String, usize)> = [
            ("HAG".to_string(), 1),
            ("HAG".to_string(), 2),
            ("JUD".to_string(), 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(requested, expected);

        Ok(())
    }

    #[tokio::test]
    async fn failures_do_not_abort_other_fetches() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        // roughly half the canon fails; which picks land on it depends on
        // the shuffle, so check consistency against the request log
        let fail: Vec<&'static str> = BIBLE_BOOKS
            .iter()
            .filter(|b| b.index % 2 == 0)
            .map(|b| b.abbr)
            .collect();
        let fetcher = Arc::new(LoggingFetcher::new().failing(&fail));
        let cache = ChapterCache::new(index.clone(), fetcher.clone());
        let mut rng = SmallRng::seed_from_u64(5);

        let fetched = prefetch_chapters(&cache, 5, &mut rng).await?;

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 5, "every pick must be attempted");
        let expected_successes = requests
            .iter()
            .filter(|(abbr, _)| !fail.contains(&abbr.as_str()))
            .count();
        assert_eq!(fetched, expected_successes);
        assert_eq!(index.cached_chapter_count().await?, expected_successes);

        Ok(())
    }

    #[tokio::test]
    async fn nothing_uncached_is_a_noop() -> Result<()> {
        let index = VerseIndex::open_memory().await?;
        let fetcher = Arc::new(LoggingFetcher::new());
        let cache = ChapterCache::new(index.clone(), fetcher.clone());
        let mut rng = SmallRng::seed_from_u64(1);

        cache_all_except(&index, &[]).await?;

        assert_eq!(prefetch_chapters(&cache, 5, &mut rng).await?, 0);
        assert!(fetcher.requests().is_empty());

        Ok(())
    }
}
