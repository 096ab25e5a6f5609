//! Reindexing of stored bookmarks.
//!
//! A reindex reloads a document, normalizes its URLs, re-acquires its
//! content (unless content is supplied) and writes it back with a fresh
//! `indexed_at`. Titles and tags are kept unless replacements are given.
//!
//! When normalization changes the primary URL the document is re-keyed:
//! it is written under the new id first, then the old id is deleted. The
//! two steps are not atomic. A failure in between leaves a stale copy
//! under the old id rather than losing the bookmark.

use std::sync::Arc;

use tracing::{info, warn};

use bookmarks_core::models::{BookmarkDocument, OneOrMany, Submission};
use bookmarks_core::normalize::normalize_url;
use bookmarks_core::present::to_stored;
use bookmarks_core::search::{build_query, PAGE_SIZE};
use bookmarks_core::store::{upsert, Store};

use crate::acquire::Acquirer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::HttpFetcher;
use crate::index::supplied_content;
use crate::sqlite_store::SqliteStore;

/// Caller overrides for a reindex.
#[derive(Debug, Clone, Default)]
pub struct ReindexOptions {
    /// Used verbatim instead of acquiring the pages.
    pub content: Option<String>,
    /// Replacement titles in stored order (collection title first).
    pub titles: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
    Updated { id: String },
    Rekeyed { old: String, new: String },
}

impl ReindexOutcome {
    /// Id the document is stored under after the reindex.
    pub fn id(&self) -> &str {
        match self {
            ReindexOutcome::Updated { id } => id,
            ReindexOutcome::Rekeyed { new, .. } => new,
        }
    }
}

/// Rebuilds the submission a stored document came from.
fn resubmission(doc: BookmarkDocument, options: &ReindexOptions) -> Submission {
    let mut titles = options.titles.clone().unwrap_or(doc.titles);
    let collection_title = (doc.urls.len() > 1 && !titles.is_empty()).then(|| titles.remove(0));

    Submission {
        titles: OneOrMany::from_vec(titles),
        urls: OneOrMany::from_vec(doc.urls.iter().map(|u| normalize_url(u)).collect()),
        collection_title,
        tags: options.tags.clone().unwrap_or(doc.tags),
        content: None,
        indexed_at: Some(doc.indexed_at),
    }
}

/// Reindexes the document stored under `id`.
///
/// Fails with [`Error::NotFound`] if there is no such document and with
/// [`Error::EmptyContent`] if no text could be acquired, in which case the
/// stored document is left as it was.
pub async fn reindex_document(
    store: &dyn Store,
    acquirer: &Acquirer,
    id: &str,
    options: ReindexOptions,
) -> Result<ReindexOutcome> {
    let current = store.get(id).await?;
    let old_id = current.id().to_string();

    let mut submission = resubmission(current, &options);
    submission.validate()?;

    let content = match supplied_content(options.content, acquirer.max_len()) {
        Some(content) => content,
        None => acquirer.acquire(submission.urls.as_slice()).await,
    };
    if content.trim().is_empty() {
        warn!(id = %old_id, "reindex produced no content");
        return Err(Error::EmptyContent(old_id));
    }
    submission.content = Some(content);

    let document = to_stored(submission, true)?;
    let new_id = document.id().to_string();

    if new_id != old_id {
        upsert(store, &document).await?;
        store.delete(&old_id).await?;
        info!(old = %old_id, new = %new_id, "bookmark re-keyed");
        Ok(ReindexOutcome::Rekeyed {
            old: old_id,
            new: new_id,
        })
    } else {
        upsert(store, &document).await?;
        info!(id = %new_id, "bookmark reindexed");
        Ok(ReindexOutcome::Updated { id: new_id })
    }
}

/// Ids of every document matching `q`, in result order.
pub async fn matching_ids(store: &dyn Store, q: Option<&str>) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut page = 1;
    loop {
        let spec = build_query(q, Some(page), PAGE_SIZE, false);
        let response = store.search(&spec).await?;
        let fetched = response.hits.len();
        ids.extend(response.hits.into_iter().map(|h| h.document.id().to_string()));
        if fetched == 0 || ids.len() as u64 >= response.total {
            break;
        }
        page += 1;
    }
    Ok(ids)
}

/// Reindexes every document matching `q`, one at a time.
///
/// The ids are collected before anything is rewritten. The first failure
/// aborts the rest of the batch; documents already reindexed stay so.
pub async fn reindex_matching(
    store: &dyn Store,
    acquirer: &Acquirer,
    q: Option<&str>,
) -> Result<Vec<ReindexOutcome>> {
    let ids = matching_ids(store, q).await?;
    info!(count = ids.len(), "reindexing matching bookmarks");

    let mut outcomes = Vec::with_capacity(ids.len());
    for id in &ids {
        let outcome = reindex_document(store, acquirer, id, ReindexOptions::default())
            .await
            .inspect_err(|e| warn!(id = %id, error = %e, "aborting batch reindex"))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn print_outcome(outcome: &ReindexOutcome) {
    match outcome {
        ReindexOutcome::Updated { id } => println!("reindexed {}", id),
        ReindexOutcome::Rekeyed { old, new } => println!("reindexed {} -> {}", old, new),
    }
}

/// CLI entry point for `bm reindex <url>`. `id` is the stored key as-is.
pub async fn run_reindex(config: &Config, id: &str, options: ReindexOptions) -> anyhow::Result<()> {
    let acquirer = Acquirer::from_config(config, Arc::new(HttpFetcher::new(&config.fetch)?));
    let store = SqliteStore::open(&config.db.path).await?;
    let result = reindex_document(&store, &acquirer, id.trim(), options).await;
    store.close().await;
    print_outcome(&result?);
    Ok(())
}

/// CLI entry point for `bm reindex --query <q>`.
pub async fn run_reindex_matching(config: &Config, q: Option<&str>) -> anyhow::Result<()> {
    let acquirer = Acquirer::from_config(config, Arc::new(HttpFetcher::new(&config.fetch)?));
    let store = SqliteStore::open(&config.db.path).await?;
    let result = reindex_matching(&store, &acquirer, q).await;
    store.close().await;
    let outcomes = result?;
    for outcome in &outcomes {
        print_outcome(outcome);
    }
    println!("{} bookmarks reindexed", outcomes.len());
    Ok(())
}
