//! SQLite-backed [`Store`] implementation.
//!
//! Documents live in `bookmarks`, one row per primary URL. Tags are
//! duplicated into `bookmark_tags` so the tag facet is a `GROUP BY`, and
//! `content` is indexed by the FTS5 table `bookmarks_fts` (porter
//! stemming). Relevance is FTS5's bm25 `rank`; highlight fragments come
//! from `snippet()` with `<mark>` delimiters and no ellipsis, which the
//! presenter adds itself.
//!
//! Every write runs in one transaction across the three tables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use bookmarks_core::models::BookmarkDocument;
use bookmarks_core::search::{FacetField, Query, QuerySpec};
use bookmarks_core::store::{SearchHit, SearchResponse, Store, StoreError};

use crate::db;
use crate::migrate::run_migrations;

/// Approximate snippet length in tokens for a 300 character fragment.
const SNIPPET_TOKENS: i64 = 48;

const DOC_COLUMNS: &str = "b.id, b.titles_json, b.title_sort, b.urls_json, b.domain, \
                           b.tags_json, b.content, b.indexed_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) and migrates the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Maps driver errors. Connection-level failures mean the store is
/// unreachable; anything else is a backend fault.
fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Backend(other.into()),
    }
}

fn json_err(err: serde_json::Error) -> StoreError {
    StoreError::Backend(err.into())
}

/// FTS5 query matching any of the whitespace-separated terms of `text`.
///
/// Each term is quoted so user input never reaches the FTS5 query
/// grammar. `None` when no term has anything to match on.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}

fn row_to_document(row: &SqliteRow) -> Result<BookmarkDocument, StoreError> {
    let titles: Vec<String> = serde_json::from_str(row.get("titles_json")).map_err(json_err)?;
    let urls: Vec<String> = serde_json::from_str(row.get("urls_json")).map_err(json_err)?;
    let tags: Vec<String> = serde_json::from_str(row.get("tags_json")).map_err(json_err)?;
    let micros: i64 = row.get("indexed_at");
    let indexed_at = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Backend(anyhow!("invalid indexed_at: {micros}")))?;

    Ok(BookmarkDocument {
        titles,
        title_sort: row.get("title_sort"),
        urls,
        domain: row.get("domain"),
        tags,
        content: row.get("content"),
        indexed_at,
    })
}

/// Writes the tag and full-text rows of `doc`, replacing existing ones.
async fn write_index_rows(
    tx: &mut Transaction<'_, Sqlite>,
    doc: &BookmarkDocument,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM bookmark_tags WHERE bookmark_id = ?")
        .bind(doc.id())
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM bookmarks_fts WHERE id = ?")
        .bind(doc.id())
        .execute(&mut **tx)
        .await?;

    for tag in &doc.tags {
        sqlx::query("INSERT OR IGNORE INTO bookmark_tags (bookmark_id, tag) VALUES (?, ?)")
            .bind(doc.id())
            .bind(tag)
            .execute(&mut **tx)
            .await?;
    }
    sqlx::query("INSERT INTO bookmarks_fts (id, content) VALUES (?, ?)")
        .bind(doc.id())
        .bind(&doc.content)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

struct Encoded {
    titles_json: String,
    urls_json: String,
    tags_json: String,
    indexed_at: i64,
}

fn encode(doc: &BookmarkDocument) -> Result<Encoded, StoreError> {
    Ok(Encoded {
        titles_json: serde_json::to_string(&doc.titles).map_err(json_err)?,
        urls_json: serde_json::to_string(&doc.urls).map_err(json_err)?,
        tags_json: serde_json::to_string(&doc.tags).map_err(json_err)?,
        indexed_at: doc.indexed_at.timestamp_micros(),
    })
}

impl SqliteStore {
    async fn facet_counts(
        &self,
        field: FacetField,
        filter: &str,
        fts: Option<&str>,
        size: usize,
    ) -> Result<HashMap<String, u64>, StoreError> {
        let sql = match field {
            FacetField::Tag => format!(
                "SELECT t.tag AS value, COUNT(*) AS n FROM bookmark_tags t \
                 WHERE t.bookmark_id IN ({filter}) \
                 GROUP BY t.tag ORDER BY n DESC, t.tag LIMIT ?"
            ),
            FacetField::Domain => format!(
                "SELECT b.domain AS value, COUNT(*) AS n FROM bookmarks b \
                 WHERE b.id IN ({filter}) \
                 GROUP BY b.domain ORDER BY n DESC, b.domain LIMIT ?"
            ),
        };

        let mut query = sqlx::query(&sql);
        if let Some(m) = fts {
            query = query.bind(m);
        }
        let rows = query
            .bind(size as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let n: i64 = row.get("n");
                (row.get("value"), n as u64)
            })
            .collect())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create(&self, doc: &BookmarkDocument) -> Result<(), StoreError> {
        let encoded = encode(doc)?;
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM bookmarks WHERE id = ?")
            .bind(doc.id())
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;
        if exists {
            return Err(StoreError::Conflict(doc.id().to_string()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO bookmarks (id, titles_json, title_sort, urls_json, domain,
                                   tags_json, content, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.id())
        .bind(&encoded.titles_json)
        .bind(&doc.title_sort)
        .bind(&encoded.urls_json)
        .bind(&doc.domain)
        .bind(&encoded.tags_json)
        .bind(&doc.content)
        .bind(encoded.indexed_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::Conflict(doc.id().to_string()));
            }
            Err(e) => return Err(store_err(e)),
        }

        write_index_rows(&mut tx, doc).await.map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn update(&self, doc: &BookmarkDocument) -> Result<(), StoreError> {
        let encoded = encode(doc)?;
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let result = sqlx::query(
            r#"
            UPDATE bookmarks SET
                titles_json = ?,
                title_sort = ?,
                urls_json = ?,
                domain = ?,
                tags_json = ?,
                content = ?,
                indexed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&encoded.titles_json)
        .bind(&doc.title_sort)
        .bind(&encoded.urls_json)
        .bind(&doc.domain)
        .bind(&encoded.tags_json)
        .bind(&doc.content)
        .bind(encoded.indexed_at)
        .bind(doc.id())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(doc.id().to_string()));
        }

        write_index_rows(&mut tx, doc).await.map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<BookmarkDocument, StoreError> {
        let row = sqlx::query(&format!("SELECT {DOC_COLUMNS} FROM bookmarks b WHERE b.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(row) => row_to_document(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for sql in [
            "DELETE FROM bookmark_tags WHERE bookmark_id = ?",
            "DELETE FROM bookmarks_fts WHERE id = ?",
            "DELETE FROM bookmarks WHERE id = ?",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn search(&self, query: &QuerySpec) -> Result<SearchResponse, StoreError> {
        let fts = match &query.query {
            Query::MatchAll => None,
            Query::Content(text) => match fts_query(text) {
                Some(m) => Some(m),
                None => return Ok(SearchResponse::default()),
            },
        };
        let filter = if fts.is_some() {
            "SELECT id FROM bookmarks_fts WHERE bookmarks_fts MATCH ?"
        } else {
            "SELECT id FROM bookmarks"
        };

        let count_sql = format!("SELECT COUNT(*) FROM ({filter})");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(m) = &fts {
            count = count.bind(m);
        }
        let total = count.fetch_one(&self.pool).await.map_err(store_err)? as u64;

        let mut hits = Vec::new();
        if query.size > 0 && total > 0 {
            let hits_sql = match (&fts, &query.highlight) {
                (Some(_), highlight) => {
                    let fragment = match highlight {
                        Some(h) => format!(
                            "snippet(bookmarks_fts, 1, '{}', '{}', '', {SNIPPET_TOKENS})",
                            h.pre_tag, h.post_tag
                        ),
                        None => "NULL".to_string(),
                    };
                    format!(
                        "SELECT {DOC_COLUMNS}, -bookmarks_fts.rank AS score, {fragment} AS fragment \
                         FROM bookmarks_fts JOIN bookmarks b ON b.id = bookmarks_fts.id \
                         WHERE bookmarks_fts MATCH ? \
                         ORDER BY bookmarks_fts.rank, b.title_sort, b.id LIMIT ? OFFSET ?"
                    )
                }
                (None, _) => format!(
                    "SELECT {DOC_COLUMNS}, 0.0 AS score, NULL AS fragment FROM bookmarks b \
                     ORDER BY b.title_sort, b.id LIMIT ? OFFSET ?"
                ),
            };

            let mut rows = sqlx::query(&hits_sql);
            if let Some(m) = &fts {
                rows = rows.bind(m);
            }
            let rows = rows
                .bind(query.size as i64)
                .bind(i64::try_from(query.from).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

            for row in &rows {
                hits.push(SearchHit {
                    document: row_to_document(row)?,
                    score: row.get("score"),
                    fragment: row.get("fragment"),
                });
            }
        }

        let mut response = SearchResponse {
            hits,
            total,
            ..Default::default()
        };
        if let Some(size) = query.facet_size(FacetField::Tag) {
            response.tags = self
                .facet_counts(FacetField::Tag, filter, fts.as_deref(), size)
                .await?;
        }
        if let Some(size) = query.facet_size(FacetField::Domain) {
            response.domains = self
                .facet_counts(FacetField::Domain, filter, fts.as_deref(), size)
                .await?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fts_query_quotes_terms() {
        assert_eq!(fts_query("dragon lair").as_deref(), Some("\"dragon\" OR \"lair\""));
        assert_eq!(fts_query("say \"hi\"").as_deref(), Some("\"say\" OR \"\"\"hi\"\"\""));
        assert_eq!(fts_query(" - * "), None);
        assert_eq!(fts_query(""), None);
    }
}
