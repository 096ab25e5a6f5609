//! Storage contract for bookmark documents.
//!
//! The [`Store`] trait is the narrow interface the pipeline uses to reach
//! the search index. Documents are keyed by their primary URL. Backends
//! are responsible for their own consistency; the only concurrency signal
//! the pipeline relies on is [`StoreError::Conflict`] from
//! [`create`](Store::create), which [`upsert`] resolves by falling back to
//! [`update`](Store::update).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::BookmarkDocument;
use crate::search::QuerySpec;

/// Failures reported by a [`Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document already exists: {0}")]
    Conflict(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A single matching document.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: BookmarkDocument,
    pub score: f64,
    /// Highlighted excerpt of `content`, when highlighting was requested.
    pub fragment: Option<String>,
}

/// One page of hits plus facet counts over the whole result set.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub tags: HashMap<String, u64>,
    pub domains: HashMap<String, u64>,
    pub total: u64,
}

/// Abstract document store.
///
/// | Method | Contract |
/// |--------|----------|
/// | [`create`](Store::create) | Insert; [`StoreError::Conflict`] if the id exists |
/// | [`update`](Store::update) | Replace fields of an existing document; [`StoreError::NotFound`] if absent |
/// | [`get`](Store::get) | Fetch by id; [`StoreError::NotFound`] if absent |
/// | [`delete`](Store::delete) | Remove by id; succeeds when absent |
/// | [`search`](Store::search) | Run a [`QuerySpec`] |
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(&self, doc: &BookmarkDocument) -> Result<(), StoreError>;

    async fn update(&self, doc: &BookmarkDocument) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<BookmarkDocument, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn search(&self, query: &QuerySpec) -> Result<SearchResponse, StoreError>;
}

/// Which branch an [`upsert`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Creates `doc`, or updates it when a document with the same id exists.
///
/// Last write wins; fields are not merged across writers.
pub async fn upsert<S: Store + ?Sized>(
    store: &S,
    doc: &BookmarkDocument,
) -> Result<Upserted, StoreError> {
    match store.create(doc).await {
        Ok(()) => Ok(Upserted::Created),
        Err(StoreError::Conflict(_)) => {
            store.update(doc).await?;
            Ok(Upserted::Updated)
        }
        Err(e) => Err(e),
    }
}
