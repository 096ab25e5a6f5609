//! Bookmark write path.
//!
//! ```text
//! Submission ─► validate ─► normalize urls ─► content (given | acquired)
//!            ─► to_stored ─► create, or update on conflict
//! ```
//!
//! Validation happens before any fetch or store call. A submission without
//! content has its pages acquired; if that yields nothing the write fails
//! with [`Error::EmptyContent`] and the store is not touched.

use std::sync::Arc;

use tracing::info;

use bookmarks_core::models::{BookmarkDocument, OneOrMany, Submission};
use bookmarks_core::normalize::normalize_url;
use bookmarks_core::present::{to_stored, truncate_chars};
use bookmarks_core::store::{upsert, Store, Upserted};

use crate::acquire::Acquirer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::HttpFetcher;
use crate::sqlite_store::SqliteStore;

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct Indexed {
    pub document: BookmarkDocument,
    pub outcome: Upserted,
}

pub fn normalize_urls(urls: OneOrMany<String>) -> OneOrMany<String> {
    match urls {
        OneOrMany::One(url) => OneOrMany::One(normalize_url(&url)),
        OneOrMany::Many(urls) => OneOrMany::Many(urls.iter().map(|u| normalize_url(u)).collect()),
    }
}

/// Blank caller-supplied content counts as absent. Anything else is held
/// to the same character budget as acquired content.
pub(crate) fn supplied_content(content: Option<String>, max_len: usize) -> Option<String> {
    let content = content.filter(|c| !c.trim().is_empty())?;
    if content.chars().count() > max_len {
        Some(truncate_chars(&content, max_len))
    } else {
        Some(content)
    }
}

/// Stores a bookmark, acquiring its content when none was supplied.
pub async fn add_bookmark(
    store: &dyn Store,
    acquirer: &Acquirer,
    mut submission: Submission,
) -> Result<Indexed> {
    submission.validate()?;

    submission.urls = normalize_urls(submission.urls);
    let primary = submission.urls.as_slice()[0].clone();

    let content = match supplied_content(submission.content.take(), acquirer.max_len()) {
        Some(content) => content,
        None => acquirer.acquire(submission.urls.as_slice()).await,
    };
    if content.trim().is_empty() {
        return Err(Error::EmptyContent(primary));
    }
    submission.content = Some(content);

    let document = to_stored(submission, false)?;
    let outcome = upsert(store, &document).await?;
    info!(id = document.id(), ?outcome, "bookmark stored");

    Ok(Indexed { document, outcome })
}

pub async fn get_bookmark(store: &dyn Store, url: &str) -> Result<BookmarkDocument> {
    Ok(store.get(&normalize_url(url)).await?)
}

/// Deletes the bookmark stored under `url`. Deleting a missing bookmark
/// succeeds.
pub async fn delete_bookmark(store: &dyn Store, url: &str) -> Result<()> {
    let id = normalize_url(url);
    store.delete(&id).await?;
    info!(id = %id, "bookmark deleted");
    Ok(())
}

/// CLI entry point for `bm add`.
pub async fn run_add(config: &Config, submission: Submission) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let acquirer = Acquirer::from_config(config, fetcher);
    let store = SqliteStore::open(&config.db.path).await?;
    let result = add_bookmark(&store, &acquirer, submission).await;
    store.close().await;
    let indexed = result?;

    let verb = match indexed.outcome {
        Upserted::Created => "created",
        Upserted::Updated => "updated",
    };
    println!(
        "{} {} ({} chars)",
        verb,
        indexed.document.id(),
        indexed.document.content.chars().count()
    );
    Ok(())
}

/// CLI entry point for `bm delete`.
pub async fn run_delete(config: &Config, url: &str) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db.path).await?;
    let result = delete_bookmark(&store, url).await;
    store.close().await;
    result?;
    println!("deleted {}", normalize_url(url));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bookmarks_core::models::ValidationError;
    use bookmarks_core::store::memory::InMemoryStore;

    use crate::extract::tests::FakeFetcher;
    use crate::extract::ExtractorTable;

    fn acquirer(fetcher: Arc<FakeFetcher>) -> Acquirer {
        Acquirer::new(ExtractorTable::standard(), fetcher, 1_000_000)
    }

    #[tokio::test]
    async fn supplied_content_skips_fetching() {
        let store = InMemoryStore::new();
        let fetcher = Arc::new(FakeFetcher::default());
        let sub = Submission::single("Post", "https://Example.com/post/?utm_source=x")
            .with_tags(["Rust"])
            .with_content("the body");

        let indexed = add_bookmark(&store, &acquirer(fetcher.clone()), sub).await.unwrap();

        assert_eq!(indexed.outcome, Upserted::Created);
        assert_eq!(indexed.document.id(), "https://example.com/post");
        assert_eq!(indexed.document.content, "the body");
        assert!(fetcher.requested().is_empty());
        assert_eq!(store.get("https://example.com/post").await.unwrap().tags, vec!["rust"]);
    }

    #[tokio::test]
    async fn missing_content_is_acquired() {
        let store = InMemoryStore::new();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with("https://a.example/1", "<html><body>one</body></html>")
                .with("https://a.example/2", "<html><body>two</body></html>"),
        );
        let sub = Submission::collection(
            "Series",
            vec![("One", "https://a.example/1"), ("Two", "https://a.example/2")],
        );

        let indexed = add_bookmark(&store, &acquirer(fetcher), sub).await.unwrap();
        assert_eq!(indexed.document.content, "one\ntwo");
        assert_eq!(indexed.document.titles, vec!["Series", "One", "Two"]);
    }

    #[tokio::test]
    async fn supplied_content_is_held_to_the_budget() {
        let store = InMemoryStore::new();
        let acq = Acquirer::new(
            ExtractorTable::standard(),
            Arc::new(FakeFetcher::default()),
            10,
        );
        let sub =
            Submission::single("Long", "https://example.com/long").with_content("é".repeat(25));

        let indexed = add_bookmark(&store, &acq, sub).await.unwrap();

        assert_eq!(indexed.document.content, "é".repeat(10));
    }

    #[tokio::test]
    async fn second_write_updates() {
        let store = InMemoryStore::new();
        let acq = acquirer(Arc::new(FakeFetcher::default()));
        let first = Submission::single("Old", "https://example.com/a").with_content("v1");
        let second = Submission::single("New", "https://example.com/a/").with_content("v2");

        add_bookmark(&store, &acq, first).await.unwrap();
        let indexed = add_bookmark(&store, &acq, second).await.unwrap();

        assert_eq!(indexed.outcome, Upserted::Updated);
        assert_eq!(store.len(), 1);
        let doc = get_bookmark(&store, "https://example.com/a").await.unwrap();
        assert_eq!(doc.titles, vec!["New"]);
        assert_eq!(doc.content, "v2");
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected_before_fetching() {
        let store = InMemoryStore::new();
        let fetcher = Arc::new(FakeFetcher::default());
        let sub = Submission {
            titles: OneOrMany::Many(vec!["A".into(), "B".into()]),
            urls: OneOrMany::One("https://u1.example/".into()),
            collection_title: Some("C".into()),
            tags: vec![],
            content: None,
            indexed_at: None,
        };

        let err = add_bookmark(&store, &acquirer(fetcher.clone()), sub).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::CountMismatch { titles: 2, urls: 1 })
        ));
        assert!(fetcher.requested().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unreachable_page_fails_without_writing() {
        let store = InMemoryStore::new();
        let sub = Submission::single("Gone", "https://gone.example/").with_content("   ");
        let err = add_bookmark(&store, &acquirer(Arc::new(FakeFetcher::default())), sub)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyContent(url) if url == "https://gone.example/"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_and_delete_normalize_their_argument() {
        let store = InMemoryStore::new();
        let acq = acquirer(Arc::new(FakeFetcher::default()));
        let sub = Submission::single("T", "https://example.com/x").with_content("c");
        add_bookmark(&store, &acq, sub).await.unwrap();

        assert!(get_bookmark(&store, "https://EXAMPLE.com/x#top").await.is_ok());
        delete_bookmark(&store, "https://example.com/x/").await.unwrap();
        assert!(matches!(
            get_bookmark(&store, "https://example.com/x").await,
            Err(Error::NotFound(_))
        ));
        delete_bookmark(&store, "https://example.com/x").await.unwrap();
    }
}
