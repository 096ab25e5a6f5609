//! Core data models for the bookmark archive.
//!
//! A bookmark moves through three shapes: the raw [`Submission`] a caller
//! hands in, the [`BookmarkDocument`] kept in the store, and the
//! [`DisplayDocument`] handed back to readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of characters kept in a document's `content` field.
pub const MAX_CONTENT_LEN: usize = 1_000_000;

/// A field that holds either a single value or a list of values.
///
/// Bookmark titles and URLs arrive both ways (`"title": "x"` and
/// `"title": ["x", "y"]`), so this is the boundary type for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Collapses a one-element vector to [`OneOrMany::One`].
    pub fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            OneOrMany::One(values.remove(0))
        } else {
            OneOrMany::Many(values)
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Rejection reasons for a [`Submission`]. Raised before any network or
/// storage call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{titles} titles supplied for {urls} urls")]
    CountMismatch { titles: usize, urls: usize },
    #[error("a collection of {0} urls needs a collection title")]
    MissingCollectionTitle(usize),
}

/// Raw bookmark as submitted by a caller.
///
/// `titles[i]` is the title of `urls[i]`. When more than one URL is given
/// the bookmark is a collection and `collection_title` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(alias = "title")]
    pub titles: OneOrMany<String>,
    #[serde(alias = "url")]
    pub urls: OneOrMany<String>,
    #[serde(default)]
    pub collection_title: Option<String>,
    #[serde(default, alias = "tag")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn single(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            titles: OneOrMany::One(title.into()),
            urls: OneOrMany::One(url.into()),
            collection_title: None,
            tags: Vec::new(),
            content: None,
            indexed_at: None,
        }
    }

    pub fn collection<T, U>(collection_title: impl Into<String>, pages: Vec<(T, U)>) -> Self
    where
        T: Into<String>,
        U: Into<String>,
    {
        let (titles, urls): (Vec<String>, Vec<String>) = pages
            .into_iter()
            .map(|(title, url)| (title.into(), url.into()))
            .unzip();
        Self {
            titles: OneOrMany::from_vec(titles),
            urls: OneOrMany::from_vec(urls),
            collection_title: Some(collection_title.into()),
            tags: Vec::new(),
            content: None,
            indexed_at: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Checks the title/url shape of the submission.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let titles = self.titles.as_slice();
        let urls = self.urls.as_slice();

        if urls.is_empty() || urls.iter().any(|u| u.trim().is_empty()) {
            return Err(ValidationError::MissingField("url"));
        }
        if titles.is_empty() || titles.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::MissingField("title"));
        }
        if titles.len() != urls.len() {
            return Err(ValidationError::CountMismatch {
                titles: titles.len(),
                urls: urls.len(),
            });
        }
        let has_collection_title = self
            .collection_title
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if urls.len() > 1 && !has_collection_title {
            return Err(ValidationError::MissingCollectionTitle(urls.len()));
        }
        Ok(())
    }
}

/// A bookmark as kept in the store.
///
/// `urls[0]` is the primary URL and the document's id. For a collection,
/// `titles[0]` is the collection title and `titles[i + 1]` belongs to
/// `urls[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkDocument {
    pub titles: Vec<String>,
    pub title_sort: String,
    pub urls: Vec<String>,
    pub domain: String,
    pub tags: Vec<String>,
    pub content: String,
    pub indexed_at: DateTime<Utc>,
}

impl BookmarkDocument {
    /// The primary URL, which doubles as the storage id.
    pub fn id(&self) -> &str {
        self.urls.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_collection(&self) -> bool {
        self.titles.len() > 1
    }
}

/// One member page of a collection, as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Part {
    pub url: String,
    pub title: String,
}

/// Where a displayed bookmark points: a single page or a list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayTarget {
    Url(String),
    Parts(Vec<Part>),
}

/// Reader-facing shape of a bookmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayDocument {
    pub title: String,
    #[serde(flatten)]
    pub target: DisplayTarget,
    pub domain: String,
    pub tags: Vec<String>,
    pub indexed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl DisplayDocument {
    pub fn url(&self) -> Option<&str> {
        match &self.target {
            DisplayTarget::Url(url) => Some(url),
            DisplayTarget::Parts(_) => None,
        }
    }

    pub fn parts(&self) -> &[Part] {
        match &self.target {
            DisplayTarget::Url(_) => &[],
            DisplayTarget::Parts(parts) => parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_or_many_accepts_scalar_and_list() {
        let one: OneOrMany<String> = serde_json::from_str(r#""a""#).unwrap();
        assert_eq!(one, OneOrMany::One("a".to_string()));

        let many: OneOrMany<String> = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many.into_vec(), vec!["a", "b"]);
    }

    #[test]
    fn from_vec_collapses_singletons() {
        assert_eq!(OneOrMany::from_vec(vec![1]), OneOrMany::One(1));
        assert_eq!(OneOrMany::from_vec(vec![1, 2]), OneOrMany::Many(vec![1, 2]));
    }

    #[test]
    fn submission_deserializes_legacy_field_names() {
        let sub: Submission = serde_json::from_str(
            r#"{"title": "Post", "url": "https://example.com/post", "tag": ["rust"]}"#,
        )
        .unwrap();
        assert_eq!(sub.titles, OneOrMany::One("Post".to_string()));
        assert_eq!(sub.tags, vec!["rust"]);
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let sub = Submission {
            titles: OneOrMany::Many(vec!["A".into(), "B".into()]),
            urls: OneOrMany::Many(vec!["u1".into()]),
            collection_title: Some("C".into()),
            tags: vec![],
            content: None,
            indexed_at: None,
        };
        assert_eq!(
            sub.validate(),
            Err(ValidationError::CountMismatch { titles: 2, urls: 1 })
        );
    }

    #[test]
    fn validate_requires_collection_title() {
        let mut sub = Submission::collection("", vec![("A", "u1"), ("B", "u2")]);
        assert_eq!(
            sub.validate(),
            Err(ValidationError::MissingCollectionTitle(2))
        );
        sub.collection_title = None;
        assert_eq!(
            sub.validate(),
            Err(ValidationError::MissingCollectionTitle(2))
        );
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert_eq!(
            Submission::single("Title", "  ").validate(),
            Err(ValidationError::MissingField("url"))
        );
        assert_eq!(
            Submission::single("", "https://example.com").validate(),
            Err(ValidationError::MissingField("title"))
        );
    }

    #[test]
    fn display_target_serializes_flat() {
        let doc = DisplayDocument {
            title: "T".into(),
            target: DisplayTarget::Url("https://example.com".into()),
            domain: "example.com".into(),
            tags: vec![],
            indexed_at: DateTime::from_timestamp(0, 0).unwrap(),
            fragment: None,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["url"], "https://example.com");
        assert!(json.get("fragment").is_none());
        assert!(json.get("parts").is_none());
    }
}
