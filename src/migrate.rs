use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the bookmark tables if they do not exist yet.
///
/// `bookmarks` holds one row per document keyed by its primary URL,
/// `bookmark_tags` backs the tag facet, and `bookmarks_fts` is the
/// full-text index over `content`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            id TEXT PRIMARY KEY,
            titles_json TEXT NOT NULL,
            title_sort TEXT NOT NULL,
            urls_json TEXT NOT NULL,
            domain TEXT NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            content TEXT NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookmark_tags (
            bookmark_id TEXT NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (bookmark_id, tag),
            FOREIGN KEY (bookmark_id) REFERENCES bookmarks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='bookmarks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE bookmarks_fts USING fts5(
                id UNINDEXED,
                content,
                tokenize = 'porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookmark_tags_tag ON bookmark_tags(tag)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookmarks_domain ON bookmarks(domain)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookmarks_title_sort ON bookmarks(title_sort)")
        .execute(pool)
        .await?;

    Ok(())
}
