//! # Bookmarks Core
//!
//! Pure logic for the bookmark archive: the document model, URL
//! normalization, the presenter that maps between submission, stored and
//! display shapes, the faceted query builder, and the store abstraction.
//!
//! This crate performs no network or filesystem I/O. Fetching, site
//! extraction, and the SQLite backend live in the `bookmarks` crate.

pub mod models;
pub mod normalize;
pub mod present;
pub mod search;
pub mod store;
