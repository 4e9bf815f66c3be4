//! SQLite operations for feed items, verse history, and comments.
//!
//! [`FeedIndex`] wraps a [`VerseIndex`] and adds the mutable side of the
//! system on the same connection pool:
//!
//! ```sql
//! CREATE TABLE feed_items (
//!     id TEXT PRIMARY KEY,        -- uuid
//!     verse_id TEXT,
//!     liked BOOLEAN,
//!     liked_at INTEGER,           -- unix millis, set iff liked
//!     hidden BOOLEAN,
//!     shown_at INTEGER,           -- unix millis
//!     sort_order REAL             -- shown_at millis + random fraction
//! );
//!
//! CREATE TABLE verse_history (
//!     verse_id TEXT PRIMARY KEY,
//!     last_seen_at INTEGER,
//!     seen_count INTEGER
//! );
//!
//! CREATE TABLE comments (
//!     id TEXT PRIMARY KEY,        -- uuid
//!     feed_item_id TEXT,
//!     parent_id TEXT,             -- NULL = top-level
//!     text TEXT,
//!     created_at INTEGER,
//!     updated_at INTEGER
//! );
//! ```

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::verse_index::VerseIndex;
use super::{Comment, FeedItem, VerseHistory};

/// Feed-side store layered over the verse cache. Derefs to [`VerseIndex`]
/// so verse reads are available through the same handle.
#[derive(Clone, Debug)]
pub struct FeedIndex {
    verse_index: VerseIndex,
    pool: SqlitePool,
}

impl FeedIndex {
    /// Open the persistent store under `base`.
    pub async fn open(base: &Path) -> Result<Self> {
        Self::wrap(VerseIndex::open(base).await?).await
    }

    /// In-memory store for tests.
    pub async fn open_memory() -> Result<Self> {
        Self::wrap(VerseIndex::open_memory().await?).await
    }

    async fn wrap(verse_index: VerseIndex) -> Result<Self> {
        let pool = verse_index.pool().clone();
        let index = Self { verse_index, pool };
        index.create_feed_tables().await?;
        Ok(index)
    }

    async fn create_feed_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_items (
                id TEXT PRIMARY KEY,
                verse_id TEXT NOT NULL,
                liked BOOLEAN NOT NULL DEFAULT FALSE,
                liked_at INTEGER,
                hidden BOOLEAN NOT NULL DEFAULT FALSE,
                shown_at INTEGER NOT NULL,
                sort_order REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS verse_history (
                verse_id TEXT PRIMARY KEY,
                last_seen_at INTEGER NOT NULL,
                seen_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                feed_item_id TEXT NOT NULL,
                parent_id TEXT,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_feed_items_verse ON feed_items(verse_id)",
            "CREATE INDEX IF NOT EXISTS idx_feed_items_order ON feed_items(sort_order)",
            "CREATE INDEX IF NOT EXISTS idx_feed_items_liked ON feed_items(liked)",
            "CREATE INDEX IF NOT EXISTS idx_feed_items_hidden ON feed_items(hidden)",
            "CREATE INDEX IF NOT EXISTS idx_feed_items_shown ON feed_items(shown_at)",
            "CREATE INDEX IF NOT EXISTS idx_comments_item ON comments(feed_item_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// The wrapped verse cache.
    pub fn verse_index(&self) -> &VerseIndex {
        &self.verse_index
    }

    // --- feed items ---

    pub async fn insert_feed_item(&self, item: &FeedItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_items (id, verse_id, liked, liked_at, hidden, shown_at, sort_order)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.verse_id)
        .bind(item.liked)
        .bind(item.liked_at)
        .bind(item.hidden)
        .bind(item.shown_at)
        .bind(item.order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_feed_item(&self, id: &str) -> Result<Option<FeedItem>> {
        let row = sqlx::query("SELECT * FROM feed_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(feed_item_from_row))
    }

    /// Set like state. `liked_at` must be `Some` iff `liked`.
    pub async fn set_like(&self, id: &str, liked: bool, liked_at: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE feed_items SET liked = ?1, liked_at = ?2 WHERE id = ?3")
            .bind(liked)
            .bind(liked_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set hidden state. The feed only ever hides, but the store permits
    /// clearing the flag.
    pub async fn set_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        sqlx::query("UPDATE feed_items SET hidden = ?1 WHERE id = ?2")
            .bind(hidden)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All currently liked items.
    pub async fn liked_items(&self) -> Result<Vec<FeedItem>> {
        let rows = sqlx::query("SELECT * FROM feed_items WHERE liked = TRUE")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(feed_item_from_row).collect())
    }

    /// Non-hidden items in feed display order.
    pub async fn visible_items(&self) -> Result<Vec<FeedItem>> {
        let rows =
            sqlx::query("SELECT * FROM feed_items WHERE hidden = FALSE ORDER BY sort_order")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(feed_item_from_row).collect())
    }

    /// Verse ids referenced by ANY feed item, hidden and retired included.
    /// This is the sampling exclusion set.
    pub async fn feed_verse_ids(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT DISTINCT verse_id FROM feed_items")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("verse_id")).collect())
    }

    // --- verse history ---

    /// Record one showing: `seen_count += 1` (or 1), `last_seen_at = now`.
    pub async fn bump_history(&self, verse_id: &str, now_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO verse_history (verse_id, last_seen_at, seen_count)
            VALUES (?1, ?2, 1)
            ON CONFLICT(verse_id) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                seen_count = seen_count + 1
            "#,
        )
        .bind(verse_id)
        .bind(now_millis)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The full history, keyed by verse id, for the sampling engine.
    pub async fn history_map(&self) -> Result<HashMap<String, VerseHistory>> {
        let rows = sqlx::query("SELECT * FROM verse_history")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let entry = VerseHistory {
                    verse_id: row.get("verse_id"),
                    last_seen_at: row.get("last_seen_at"),
                    seen_count: row.get::<i64, _>("seen_count") as u32,
                };
                (entry.verse_id.clone(), entry)
            })
            .collect())
    }

    // --- comments ---

    pub async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, feed_item_id, parent_id, text, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.feed_item_id)
        .bind(comment.parent_id.as_deref())
        .bind(&comment.text)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(comment_from_row))
    }

    /// All comments on a feed item, oldest first.
    pub async fn comments_for_item(&self, feed_item_id: &str) -> Result<Vec<Comment>> {
        let rows =
            sqlx::query("SELECT * FROM comments WHERE feed_item_id = ?1 ORDER BY created_at")
                .bind(feed_item_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Direct children of a comment.
    pub async fn children_of(&self, parent_id: &str) -> Result<Vec<Comment>> {
        let rows = sqlx::query("SELECT * FROM comments WHERE parent_id = ?1 ORDER BY created_at")
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Delete a comment and every transitive reply. Breadth-first subtree
    /// collection, then one bulk delete. Unknown ids delete nothing.
    pub async fn delete_comment_tree(&self, id: &str) -> Result<usize> {
        let mut to_delete: Vec<String> = vec![id.to_string()];
        let mut cursor = 0;
        while cursor < to_delete.len() {
            let children = self.children_of(&to_delete[cursor]).await?;
            to_delete.extend(children.into_iter().map(|c| c.id));
            cursor += 1;
        }

        let placeholders = to_delete
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!("DELETE FROM comments WHERE id IN ({placeholders})");
        let mut query_builder = sqlx::query(&query);
        for comment_id in &to_delete {
            query_builder = query_builder.bind(comment_id);
        }

        let result = query_builder.execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }
}

// Verse reads pass through to the wrapped index.
impl std::ops::Deref for FeedIndex {
    type Target = VerseIndex;

    fn deref(&self) -> &Self::Target {
        &self.verse_index
    }
}

fn feed_item_from_row(row: &sqlx::sqlite::SqliteRow) -> FeedItem {
    FeedItem {
        id: row.get("id"),
        verse_id: row.get("verse_id"),
        liked: row.get("liked"),
        liked_at: row.get("liked_at"),
        hidden: row.get("hidden"),
        shown_at: row.get("shown_at"),
        order: row.get("sort_order"),
    }
}

fn comment_from_row(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        feed_item_id: row.get("feed_item_id"),
        parent_id: row.get("parent_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, verse_id: &str, order: f64) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            verse_id: verse_id.to_string(),
            liked: false,
            liked_at: None,
            hidden: false,
            shown_at: order as i64,
            order,
        }
    }

    fn comment(id: &str, feed_item_id: &str, parent_id: Option<&str>, created_at: i64) -> Comment {
        Comment {
            id: id.to_string(),
            feed_item_id: feed_item_id.to_string(),
            parent_id: parent_id.map(String::from),
            text: format!("comment {id}"),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn like_and_hide_roundtrip() -> Result<()> {
        let index = FeedIndex::open_memory().await?;
        index.insert_feed_item(&item("a", "GEN:1:1", 1.0)).await?;

        index.set_like("a", true, Some(42)).await?;
        let liked = index.liked_items().await?;
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].liked_at, Some(42));

        index.set_like("a", false, None).await?;
        assert!(index.liked_items().await?.is_empty());
        let stored = index.get_feed_item("a").await?.unwrap();
        assert!(!stored.liked);
        assert_eq!(stored.liked_at, None);

        index.set_hidden("a", true).await?;
        assert!(index.visible_items().await?.is_empty());
        // no UI path unhides, but the store must not forbid it
        index.set_hidden("a", false).await?;
        assert_eq!(index.visible_items().await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn visible_items_sorted_by_order() -> Result<()> {
        let index = FeedIndex::open_memory().await?;
        index.insert_feed_item(&item("b", "GEN:1:2", 200.5)).await?;
        index.insert_feed_item(&item("a", "GEN:1:1", 100.5)).await?;
        index.insert_feed_item(&item("c", "GEN:1:3", 300.5)).await?;
        index.set_hidden("c", true).await?;

        let visible = index.visible_items().await?;
        let ids: Vec<&str> = visible.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let excluded = index.feed_verse_ids().await?;
        // hidden items still count toward the exclusion set
        assert_eq!(excluded.len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn history_upsert_increments() -> Result<()> {
        let index = FeedIndex::open_memory().await?;

        index.bump_history("GEN:1:1", 1_000).await?;
        index.bump_history("GEN:1:1", 2_000).await?;
        index.bump_history("GEN:1:2", 3_000).await?;

        let history = index.history_map().await?;
        assert_eq!(history.len(), 2);
        let first = &history["GEN:1:1"];
        assert_eq!(first.seen_count, 2);
        assert_eq!(first.last_seen_at, 2_000);
        assert_eq!(history["GEN:1:2"].seen_count, 1);

        Ok(())
    }

    /// Deleting A removes the whole chain A -> B -> C; deleting B from a
    /// fresh chain leaves A in place.
    #[tokio::test]
    async fn comment_cascade() -> Result<()> {
        let index = FeedIndex::open_memory().await?;
        index.insert_comment(&comment("a", "item", None, 1)).await?;
        index.insert_comment(&comment("b", "item", Some("a"), 2)).await?;
        index.insert_comment(&comment("c", "item", Some("b"), 3)).await?;

        let removed = index.delete_comment_tree("a").await?;
        assert_eq!(removed, 3);
        assert!(index.comments_for_item("item").await?.is_empty());

        index.insert_comment(&comment("a", "item", None, 1)).await?;
        index.insert_comment(&comment("b", "item", Some("a"), 2)).await?;
        index.insert_comment(&comment("c", "item", Some("b"), 3)).await?;

        let removed = index.delete_comment_tree("b").await?;
        assert_eq!(removed, 2);
        let left: Vec<Comment> = index.comments_for_item("item").await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "a");

        // unknown id: empty subtree, nothing removed
        assert_eq!(index.delete_comment_tree("missing").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn comments_ordered_by_creation() -> Result<()> {
        let index = FeedIndex::open_memory().await?;
        index.insert_comment(&comment("late", "item", None, 300)).await?;
        index.insert_comment(&comment("early", "item", None, 100)).await?;
        index.insert_comment(&comment("mid", "item", None, 200)).await?;

        let ordered = index.comments_for_item("item").await?;
        let ids: Vec<&str> = ordered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["early", "mid", "late"]);

        Ok(())
    }
}
