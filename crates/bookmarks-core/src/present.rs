//! Document presenter.
//!
//! Two mappings around the stored [`BookmarkDocument`]:
//!
//! - [`to_stored`] turns a validated [`Submission`] into the stored shape,
//!   deriving `title_sort`, `domain`, normalized tags, and `indexed_at`.
//! - [`to_display`] turns a stored document (plus an optional highlight
//!   fragment from the search layer) into a [`DisplayDocument`].
//!
//! Neither mapping touches the network or the store.

use std::collections::BTreeSet;

use chrono::Utc;
use url::Url;

use crate::models::{
    BookmarkDocument, DisplayDocument, DisplayTarget, Part, Submission, ValidationError,
    MAX_CONTENT_LEN,
};

/// Opening delimiter wrapped around highlighted terms.
pub const HIGHLIGHT_PRE: &str = "<mark>";
/// Closing delimiter wrapped around highlighted terms.
pub const HIGHLIGHT_POST: &str = "</mark>";
/// Marker added where a fragment does not reach the edge of the content.
pub const ELLIPSIS: &str = "…";

/// Builds the stored shape of a submission.
///
/// `indexed_at` is carried over from the submission unless it is absent or
/// `reindex` is set, in which case it becomes the current time.
pub fn to_stored(
    submission: Submission,
    reindex: bool,
) -> Result<BookmarkDocument, ValidationError> {
    submission.validate()?;

    let urls = submission.urls.into_vec();
    let mut titles: Vec<String> = submission
        .titles
        .into_vec()
        .into_iter()
        .map(|t| t.trim().to_string())
        .collect();
    if urls.len() > 1 {
        let collection_title = submission.collection_title.unwrap_or_default();
        titles.insert(0, collection_title.trim().to_string());
    }

    let indexed_at = match submission.indexed_at {
        Some(ts) if !reindex => ts,
        _ => Utc::now(),
    };

    Ok(BookmarkDocument {
        title_sort: titles[0].clone(),
        domain: domain_of(&urls[0]),
        tags: normalize_tags(submission.tags),
        content: truncate_chars(&submission.content.unwrap_or_default(), MAX_CONTENT_LEN),
        titles,
        urls,
        indexed_at,
    })
}

/// Builds the reader-facing shape of a stored document.
pub fn to_display(doc: &BookmarkDocument, fragment: Option<&str>) -> DisplayDocument {
    let target = if doc.is_collection() {
        DisplayTarget::Parts(
            doc.titles[1..]
                .iter()
                .zip(&doc.urls)
                .map(|(title, url)| Part {
                    url: url.clone(),
                    title: title.clone(),
                })
                .collect(),
        )
    } else {
        DisplayTarget::Url(doc.id().to_string())
    };

    DisplayDocument {
        title: doc.titles.first().cloned().unwrap_or_default(),
        target,
        domain: doc.domain.clone(),
        tags: doc.tags.clone(),
        indexed_at: doc.indexed_at,
        fragment: fragment
            .filter(|f| !f.is_empty())
            .map(|f| pad_fragment(&doc.content, f)),
    }
}

/// Adds an ellipsis to each side of `fragment` that does not line up with
/// the corresponding edge of `content`, comparing with highlight markup
/// stripped.
pub fn pad_fragment(content: &str, fragment: &str) -> String {
    let plain = fragment.replace(HIGHLIGHT_PRE, "").replace(HIGHLIGHT_POST, "");
    let mut out = String::with_capacity(fragment.len() + 2 * ELLIPSIS.len());
    if !content.starts_with(&plain) {
        out.push_str(ELLIPSIS);
    }
    out.push_str(fragment);
    if !content.ends_with(&plain) {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Lowercases and trims tags, drops empty ones, collapses duplicates, and
/// returns them sorted.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Network location (`host[:port]`) of a URL.
///
/// Falls back to the third `/`-separated segment, then to the URL itself,
/// when the URL has no parsable host.
pub fn domain_of(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            return match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }
    }
    url.split('/')
        .nth(2)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_string()
}

/// Truncates `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
