//! SQLite operations for the verse cache.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Verses: append-only, keyed by the natural id "ABBR:chapter:verse"
//! CREATE TABLE verses (
//!     id TEXT PRIMARY KEY,
//!     book TEXT,            -- full book name
//!     book_index INTEGER,   -- canonical position 0-65
//!     chapter INTEGER,
//!     verse INTEGER,
//!     text TEXT,
//!     reference TEXT        -- "Genesis 1:1"
//! );
//!
//! -- Chapter markers: presence implies the chapter's verses are all cached
//! CREATE TABLE cached_chapters (
//!     id TEXT PRIMARY KEY,  -- "ABBR:chapter"
//!     book_id TEXT,
//!     book_name TEXT,
//!     chapter INTEGER,
//!     cached_at INTEGER,    -- unix millis
//!     verse_count INTEGER
//! );
//! ```
//!
//! The marker and its verse batch are written in a single transaction:
//! either both are visible or neither is. Verse writes are upserts keyed by
//! id, so concurrent duplicate fetches of the same chapter converge.

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

use daily_bread_api::Verse;

use super::CachedChapter;

/// SQLite-backed verse cache. Cheap to clone; clones share the pool.
#[derive(Clone, Debug)]
pub struct VerseIndex {
    pool: SqlitePool,
}

impl VerseIndex {
    /// Open (creating if missing) the persistent cache under `base`.
    pub async fn open(base: &Path) -> Result<Self> {
        let db_path = base.join(".daily-bread.db");

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// In-memory cache for tests. Pinned to a single connection: every
    /// pooled connection would otherwise get its own empty in-memory
    /// database.
    pub async fn open_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS verses (
                id TEXT PRIMARY KEY,
                book TEXT NOT NULL,
                book_index INTEGER NOT NULL,
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                text TEXT NOT NULL,
                reference TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cached_chapters (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                book_name TEXT NOT NULL,
                chapter INTEGER NOT NULL,
                cached_at INTEGER NOT NULL,
                verse_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_verses_book ON verses(book)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_verses_chapter ON verses(chapter)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_verses_book_index ON verses(book_index)")
            .execute(pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_verses_book_chapter ON verses(book, chapter)",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cached_chapters_book ON cached_chapters(book_id)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cached_chapters_chapter ON cached_chapters(chapter)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Store a chapter's verse batch together with its marker, atomically.
    pub async fn upsert_chapter(&self, marker: &CachedChapter, verses: &[Verse]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for verse in verses {
            sqlx::query(
                r#"
                INSERT INTO verses (id, book, book_index, chapter, verse, text, reference)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    book = excluded.book,
                    book_index = excluded.book_index,
                    chapter = excluded.chapter,
                    verse = excluded.verse,
                    text = excluded.text,
                    reference = excluded.reference
                "#,
            )
            .bind(&verse.id)
            .bind(&verse.book)
            .bind(verse.book_index as i64)
            .bind(verse.chapter as i64)
            .bind(verse.verse as i64)
            .bind(&verse.text)
            .bind(&verse.reference)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO cached_chapters (id, book_id, book_name, chapter, cached_at, verse_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                cached_at = excluded.cached_at,
                verse_count = excluded.verse_count
            "#,
        )
        .bind(&marker.id)
        .bind(&marker.book_id)
        .bind(&marker.book_name)
        .bind(marker.chapter as i64)
        .bind(marker.cached_at)
        .bind(marker.verse_count as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Whether a chapter's marker is present.
    pub async fn has_chapter(&self, book_abbr: &str, chapter: usize) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM cached_chapters WHERE id = ?1")
            .bind(CachedChapter::key(book_abbr, chapter))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get a chapter marker by (book, chapter).
    pub async fn get_cached_chapter(
        &self,
        book_abbr: &str,
        chapter: usize,
    ) -> Result<Option<CachedChapter>> {
        let row = sqlx::query("SELECT * FROM cached_chapters WHERE id = ?1")
            .bind(CachedChapter::key(book_abbr, chapter))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| CachedChapter {
            id: row.get("id"),
            book_id: row.get("book_id"),
            book_name: row.get("book_name"),
            chapter: row.get::<i64, _>("chapter") as usize,
            cached_at: row.get("cached_at"),
            verse_count: row.get::<i64, _>("verse_count") as usize,
        }))
    }

    /// Number of cached chapter markers.
    pub async fn cached_chapter_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_chapters")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Ids (`ABBR:chapter`) of every cached chapter.
    pub async fn cached_chapter_ids(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT id FROM cached_chapters")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    /// All verses of one chapter, in verse order. Looks up by the full book
    /// name (the `verses.book` column), matching the marker's `book_name`.
    pub async fn chapter_verses(&self, book_name: &str, chapter: usize) -> Result<Vec<Verse>> {
        let rows = sqlx::query(
            "SELECT * FROM verses WHERE book = ?1 AND chapter = ?2 ORDER BY verse",
        )
        .bind(book_name)
        .bind(chapter as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(verse_from_row).collect())
    }

    /// Every cached verse.
    pub async fn all_verses(&self) -> Result<Vec<Verse>> {
        let rows = sqlx::query("SELECT * FROM verses ORDER BY book_index, chapter, verse")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(verse_from_row).collect())
    }

    /// Point lookup by verse id.
    pub async fn get_verse(&self, id: &str) -> Result<Option<Verse>> {
        let row = sqlx::query("SELECT * FROM verses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(verse_from_row))
    }

    /// Number of cached verses.
    pub async fn verse_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// The underlying SQLite connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn verse_from_row(row: &sqlx::sqlite::SqliteRow) -> Verse {
    Verse {
        id: row.get("id"),
        book: row.get("book"),
        book_index: row.get::<i64, _>("book_index") as usize,
        chapter: row.get::<i64, _>("chapter") as usize,
        verse: row.get::<i64, _>("verse") as usize,
        text: row.get("text"),
        reference: row.get("reference"),
    }
}
