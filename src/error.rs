//! Pipeline error type.
//!
//! Transient fetch failures and site-extraction misses never show up here:
//! they degrade to empty or default text inside the fetch and extract
//! layers. What remains is what a caller has to act on.

use thiserror::Error;

use bookmarks_core::models::ValidationError;
use bookmarks_core::store::StoreError;

/// Message shown when the backing store cannot be reached.
pub const UNAVAILABLE_MESSAGE: &str =
    "The search server is unavailable.  Try again in a minute or two.";

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed submission. Raised before any fetch or store call.
    #[error("invalid bookmark: {0}")]
    Validation(#[from] ValidationError),

    #[error("bookmark not found: {0}")]
    NotFound(String),

    /// Acquisition produced no text for any URL of the bookmark.
    #[error("no content could be retrieved for {0}")]
    EmptyContent(String),

    #[error("{msg} ({0})", msg = UNAVAILABLE_MESSAGE)]
    Unavailable(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Error::NotFound(id),
            StoreError::Unavailable(msg) => Error::Unavailable(msg),
            other => Error::Store(other),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
