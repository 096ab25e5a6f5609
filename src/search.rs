//! Faceted bookmark search.
//!
//! [`search_bookmarks`] runs a query built by
//! [`build_query`](bookmarks_core::search::build_query) against a store and
//! assembles the display page. `bm search` and `bm tags` print the result.

use anyhow::Context;

use bookmarks_core::search::{
    assemble_page, build_query, facets_only, ranked, FacetCount, SearchPage,
};
use bookmarks_core::store::Store;

use crate::config::Config;
use crate::error::Result;
use crate::sqlite_store::SqliteStore;

/// One page of results for `q`. `page` is 1-based; anything else means
/// the first page.
pub async fn search_bookmarks(
    store: &dyn Store,
    q: Option<&str>,
    page: Option<i64>,
    page_size: usize,
    highlight: bool,
) -> Result<SearchPage> {
    let spec = build_query(q, page, page_size, highlight);
    let response = store.search(&spec).await?;
    Ok(assemble_page(&spec, response))
}

/// Every tag in the archive with its document count, most used first.
pub async fn all_tags(store: &dyn Store) -> Result<Vec<FacetCount>> {
    let response = store.search(&facets_only()).await?;
    Ok(ranked(&response.tags))
}

/// CLI entry point for `bm search`.
pub async fn run_search(
    config: &Config,
    q: Option<&str>,
    page: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db.path).await?;
    let result = search_bookmarks(&store, q, page, config.search.page_size, !json).await;
    store.close().await;
    let page = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let first = (page.page - 1).saturating_mul(config.search.page_size);
    for (i, doc) in page.results.iter().enumerate() {
        println!("{}. {}", first.saturating_add(i + 1), doc.title);
        match doc.url() {
            Some(url) => println!("    url: {}", url),
            None => {
                for part in doc.parts() {
                    println!("    part: {} <{}>", part.title, part.url);
                }
            }
        }
        println!("    domain: {}", doc.domain);
        if !doc.tags.is_empty() {
            println!("    tags: {}", doc.tags.join(", "));
        }
        println!("    indexed: {}", doc.indexed_at.format("%Y-%m-%d"));
        if let Some(ref fragment) = doc.fragment {
            println!("    excerpt: \"{}\"", fragment.replace('\n', " ").trim());
        }
        println!();
    }

    println!(
        "page {} of {} ({} bookmarks)",
        page.page, page.pages, page.total
    );
    if !page.tags.is_empty() {
        let tags: Vec<String> = page
            .tags
            .iter()
            .map(|t| format!("{} ({})", t.value, t.count))
            .collect();
        println!("narrow by tag: {}", tags.join(", "));
    }
    Ok(())
}

/// CLI entry point for `bm tags`.
pub async fn run_tags(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db.path).await?;
    let tags = all_tags(&store).await;
    store.close().await;

    for tag in tags.context("Failed to list tags")? {
        println!("{}\t{}", tag.count, tag.value);
    }
    Ok(())
}
