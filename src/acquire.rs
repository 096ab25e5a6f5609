//! Content acquisition over an ordered URL list.
//!
//! [`Acquirer::acquire`] fetches and extracts each URL in order and joins
//! the trimmed texts with newlines. Once the accumulated text reaches the
//! budget, the remaining URLs are not fetched at all. The result is then
//! hard-truncated to the budget in case a single page overshot it.
//!
//! An unreachable page contributes nothing. Deciding whether an empty
//! result is a failure is left to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use bookmarks_core::present::truncate_chars;

use crate::config::Config;
use crate::extract::{ExtractContext, ExtractorTable};
use crate::fetch::{Fetcher, HttpFetcher};

/// Immutable acquisition setup, built once and shared by every request.
#[derive(Clone)]
pub struct Acquirer {
    table: ExtractorTable,
    fetcher: Arc<dyn Fetcher>,
    max_len: usize,
    youtube_api_key: Option<String>,
}

impl Acquirer {
    pub fn new(table: ExtractorTable, fetcher: Arc<dyn Fetcher>, max_len: usize) -> Self {
        Self {
            table,
            fetcher,
            max_len,
            youtube_api_key: None,
        }
    }

    /// The standard site table with the budget and API key from `config`.
    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(ExtractorTable::standard(), fetcher, config.content.max_len)
            .with_youtube_api_key(config.fetch.youtube_api_key.clone())
    }

    pub fn with_youtube_api_key(mut self, key: Option<String>) -> Self {
        self.youtube_api_key = key;
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub async fn acquire(&self, urls: &[String]) -> String {
        let ctx = ExtractContext {
            fetcher: self.fetcher.as_ref(),
            youtube_api_key: self.youtube_api_key.as_deref(),
        };

        let mut content = String::new();
        let mut len = 0usize;

        for (i, url) in urls.iter().enumerate() {
            if len >= self.max_len {
                info!(
                    skipped = urls.len() - i,
                    max_len = self.max_len,
                    "content budget reached"
                );
                break;
            }

            let extractor = self.table.resolve(url);
            let text = extractor.extract(url, &ctx).await;
            let text = text.trim();
            debug!(url = %url, extractor = ?extractor, chars = text.chars().count(), "extracted");
            if text.is_empty() {
                continue;
            }

            if !content.is_empty() {
                content.push('\n');
                len += 1;
            }
            content.push_str(text);
            len += text.chars().count();
        }

        if len > self.max_len {
            truncate_chars(&content, self.max_len)
        } else {
            content
        }
    }
}

/// CLI entry point for `bm fetch`: prints the acquired text of `urls`.
pub async fn run_fetch(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let acquirer = Acquirer::from_config(config, Arc::new(HttpFetcher::new(&config.fetch)?));
    let content = acquirer.acquire(urls).await;
    if content.is_empty() {
        anyhow::bail!("no content could be retrieved");
    }
    println!("{}", content);
    Ok(())
}
