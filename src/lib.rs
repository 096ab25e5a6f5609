//! # Bookmarks
//!
//! A personal bookmark archive that keeps a full-text snapshot of every
//! bookmarked page, so a bookmark stays searchable after its page is gone.
//!
//! This crate holds the I/O side of the pipeline: page fetching,
//! site-specific extraction, content acquisition, the write and reindex
//! paths, and the SQLite store. The pure logic (document model, URL
//! normalization, presenter, query builder, store contract) lives in
//! `bookmarks-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐
//! │  Fetcher   │──▶│  Extractors  │──▶│  Acquirer  │
//! │ HTTP+retry │   │ site table   │   │  budget    │
//! └────────────┘   └──────────────┘   └─────┬──────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                ┌──────────┐        ┌────────────┐
//!                │  index   │        │  reindex   │
//!                │ (write)  │        │  (rekey)   │
//!                └────┬─────┘        └─────┬──────┘
//!                     └─────────┬──────────┘
//!                               ▼
//!                        ┌────────────┐
//!                        │   Store    │
//!                        │ SQLite FTS │
//!                        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bm init
//! bm add https://blog.regehr.org/archives/1234 --title "A post" --tag c
//! bm search "undefined behavior"
//! bm reindex --query "" # refresh everything
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetch`] | HTTP fetching with one retry |
//! | [`extract`] | Site extractor table and strategies |
//! | [`acquire`] | Budgeted content acquisition |
//! | [`index`] | Add, get, delete |
//! | [`reindex`] | Single and batch reindex with re-keying |
//! | [`search`] | Faceted search |
//! | [`sqlite_store`] | SQLite [`Store`](bookmarks_core::store::Store) backend |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Pipeline error type |

pub mod acquire;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod get;
pub mod index;
pub mod migrate;
pub mod reindex;
pub mod search;
pub mod sqlite_store;
