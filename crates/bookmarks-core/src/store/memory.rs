//! In-memory [`Store`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Full-text matching is a
//! case-insensitive (ASCII) substring count per query term; highlight
//! fragments are cut from `content` around the first match.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::BookmarkDocument;
use crate::search::{ranked, FacetField, Highlight, Query, QuerySpec};

use super::{SearchHit, SearchResponse, Store, StoreError};

/// In-memory store for tests and examples.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, BookmarkDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn query_terms(query: &Query) -> Vec<String> {
    match query {
        Query::MatchAll => Vec::new(),
        Query::Content(text) => text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
    }
}

/// Byte ranges of case-insensitive (ASCII) occurrences of `needle`.
fn find_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    let mut out = Vec::new();
    if pat.is_empty() || pat.len() > hay.len() {
        return out;
    }
    let mut i = 0;
    while i + pat.len() <= hay.len() {
        let end = i + pat.len();
        if hay[i..end].eq_ignore_ascii_case(pat)
            && haystack.is_char_boundary(i)
            && haystack.is_char_boundary(end)
        {
            out.push((i, end));
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

fn all_matches(content: &str, terms: &[String]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = terms
        .iter()
        .flat_map(|t| find_matches(content, t))
        .collect();
    ranges.sort();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last() {
            Some(last) if r.0 < last.1 => {}
            _ => merged.push(r),
        }
    }
    merged
}

fn highlight_fragment(content: &str, ranges: &[(usize, usize)], h: &Highlight) -> Option<String> {
    let first = ranges.first()?.0;
    let lead = h.fragment_size / 3;
    let start = content[..first]
        .char_indices()
        .map(|(i, _)| i)
        .rev()
        .take(lead)
        .last()
        .unwrap_or(first);
    let end = content[start..]
        .char_indices()
        .nth(h.fragment_size)
        .map(|(i, _)| start + i)
        .unwrap_or(content.len());

    let mut out = String::new();
    let mut cursor = start;
    for &(s, e) in ranges.iter().filter(|(s, e)| *s >= start && *e <= end) {
        out.push_str(&content[cursor..s]);
        out.push_str(h.pre_tag);
        out.push_str(&content[s..e]);
        out.push_str(h.post_tag);
        cursor = e;
    }
    out.push_str(&content[cursor..end]);
    Some(out)
}

fn top_buckets(counts: HashMap<String, u64>, size: usize) -> HashMap<String, u64> {
    ranked(&counts)
        .into_iter()
        .take(size)
        .map(|f| (f.value, f.count))
        .collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create(&self, doc: &BookmarkDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        if docs.contains_key(doc.id()) {
            return Err(StoreError::Conflict(doc.id().to_string()));
        }
        docs.insert(doc.id().to_string(), doc.clone());
        Ok(())
    }

    async fn update(&self, doc: &BookmarkDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(doc.id()) {
            Some(existing) => {
                *existing = doc.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(doc.id().to_string())),
        }
    }

    async fn get(&self, id: &str) -> Result<BookmarkDocument, StoreError> {
        let docs = self.docs.read().unwrap();
        docs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.docs.write().unwrap().remove(id);
        Ok(())
    }

    async fn search(&self, query: &QuerySpec) -> Result<SearchResponse, StoreError> {
        let docs = self.docs.read().unwrap();
        let terms = query_terms(&query.query);

        let mut matched: Vec<(&BookmarkDocument, f64, Vec<(usize, usize)>)> = docs
            .values()
            .filter_map(|doc| {
                if terms.is_empty() {
                    return Some((doc, 1.0, Vec::new()));
                }
                let ranges = all_matches(&doc.content, &terms);
                (!ranges.is_empty()).then(|| (doc, ranges.len() as f64, ranges))
            })
            .collect();

        matched.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.title_sort.cmp(&b.0.title_sort))
                .then_with(|| a.0.id().cmp(b.0.id()))
        });

        let mut tags: HashMap<String, u64> = HashMap::new();
        let mut domains: HashMap<String, u64> = HashMap::new();
        for (doc, _, _) in &matched {
            for tag in &doc.tags {
                *tags.entry(tag.clone()).or_default() += 1;
            }
            *domains.entry(doc.domain.clone()).or_default() += 1;
        }

        let hits = matched
            .iter()
            .skip(query.from)
            .take(query.size)
            .map(|(doc, score, ranges)| SearchHit {
                document: (*doc).clone(),
                score: *score,
                fragment: query
                    .highlight
                    .as_ref()
                    .and_then(|h| highlight_fragment(&doc.content, ranges, h)),
            })
            .collect();

        Ok(SearchResponse {
            hits,
            tags: match query.facet_size(FacetField::Tag) {
                Some(size) => top_buckets(tags, size),
                None => HashMap::new(),
            },
            domains: match query.facet_size(FacetField::Domain) {
                Some(size) => top_buckets(domains, size),
                None => HashMap::new(),
            },
            total: matched.len() as u64,
        })
    }
}
