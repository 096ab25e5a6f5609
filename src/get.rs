//! `bm get`: print one stored bookmark.

use anyhow::Result;

use bookmarks_core::models::DisplayTarget;
use bookmarks_core::present::to_display;

use crate::config::Config;
use crate::index::get_bookmark;
use crate::sqlite_store::SqliteStore;

/// CLI entry point. With `json`, prints the display shape plus `content`.
pub async fn run_get(config: &Config, url: &str, json: bool) -> Result<()> {
    let store = SqliteStore::open(&config.db.path).await?;
    let doc = get_bookmark(&store, url).await;
    store.close().await;
    let doc = doc?;

    let display = to_display(&doc, None);

    if json {
        let mut value = serde_json::to_value(&display)?;
        value["content"] = serde_json::Value::String(doc.content);
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("--- Bookmark ---");
    println!("title:      {}", display.title);
    match &display.target {
        DisplayTarget::Url(url) => println!("url:        {}", url),
        DisplayTarget::Parts(parts) => {
            for (i, part) in parts.iter().enumerate() {
                println!("part {:<5} {} <{}>", format!("{}:", i + 1), part.title, part.url);
            }
        }
    }
    println!("domain:     {}", display.domain);
    println!("tags:       {}", display.tags.join(", "));
    println!(
        "indexed_at: {}",
        display.indexed_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!();

    println!("--- Content ({} chars) ---", doc.content.chars().count());
    println!("{}", doc.content);

    Ok(())
}
