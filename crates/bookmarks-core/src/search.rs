//! Faceted search query building and result-page assembly.
//!
//! [`build_query`] turns a user query and page number into a backend
//! independent [`QuerySpec`]. After a [`Store`](crate::store::Store) has
//! run it, [`assemble_page`] converts the raw [`SearchResponse`] into a
//! [`SearchPage`]: display documents with padded highlight fragments,
//! ranked facets, and pagination info.
//!
//! # Ordering
//!
//! Hits are sorted by relevance score, ties broken by `title_sort`.
//! Facets are ranked by descending count, ties broken by ascending value.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::DisplayDocument;
use crate::present::{to_display, HIGHLIGHT_POST, HIGHLIGHT_PRE};
use crate::store::SearchResponse;

/// Default number of hits per page.
pub const PAGE_SIZE: usize = 20;
/// Maximum number of distinct buckets returned per facet.
pub const FACET_SIZE: usize = 500;
/// Maximum length of a highlight fragment, in characters.
pub const FRAGMENT_SIZE: usize = 300;

/// What to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    MatchAll,
    /// Full-text query over the `content` field.
    Content(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetField {
    Tag,
    Domain,
}

impl FacetField {
    /// Stored field name.
    pub fn field_name(&self) -> &'static str {
        match self {
            FacetField::Tag => "tag",
            FacetField::Domain => "domain",
        }
    }

    /// Name of the aggregation in responses.
    pub fn agg_name(&self) -> &'static str {
        match self {
            FacetField::Tag => "tags",
            FacetField::Domain => "domains",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facet {
    pub field: FacetField,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Score,
    TitleSort,
}

/// Highlight request over `content`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub fragment_size: usize,
    pub pre_tag: &'static str,
    pub post_tag: &'static str,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            fragment_size: FRAGMENT_SIZE,
            pre_tag: HIGHLIGHT_PRE,
            post_tag: HIGHLIGHT_POST,
        }
    }
}

/// Backend-independent search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub query: Query,
    pub facets: Vec<Facet>,
    pub from: usize,
    pub size: usize,
    pub sort: Vec<SortKey>,
    pub highlight: Option<Highlight>,
}

impl QuerySpec {
    /// 1-based page number requested.
    pub fn page(&self) -> usize {
        self.from / self.size.max(1) + 1
    }

    pub fn facet_size(&self, field: FacetField) -> Option<usize> {
        self.facets.iter().find(|f| f.field == field).map(|f| f.size)
    }

    /// Renders the request as an Elasticsearch query body.
    pub fn to_json(&self) -> Value {
        let must = match &self.query {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Content(text) => {
                json!({ "query_string": { "query": text, "default_field": "content" } })
            }
        };

        let aggs: serde_json::Map<String, Value> = self
            .facets
            .iter()
            .map(|f| {
                (
                    f.field.agg_name().to_string(),
                    json!({ "terms": { "field": f.field.field_name(), "size": f.size } }),
                )
            })
            .collect();

        let sort: Vec<&str> = self
            .sort
            .iter()
            .map(|key| match key {
                SortKey::Score => "_score",
                SortKey::TitleSort => "title_sort",
            })
            .collect();

        let mut body = json!({
            "query": { "bool": { "must": [must] } },
            "aggs": aggs,
            "from": self.from,
            "size": self.size,
            "sort": sort,
        });
        if let Some(h) = &self.highlight {
            body["highlight"] = json!({
                "fields": { "content": {} },
                "fragment_size": h.fragment_size,
                "pre_tags": [h.pre_tag],
                "post_tags": [h.post_tag],
            });
        }
        body
    }
}

/// Builds the faceted query for `q` and a 1-based `page`.
///
/// A blank `q` matches everything. A missing or non-positive `page`
/// means the first page. Offsets saturate, so an absurdly large `page`
/// lands past the last result instead of overflowing.
pub fn build_query(
    q: Option<&str>,
    page: Option<i64>,
    page_size: usize,
    highlight: bool,
) -> QuerySpec {
    let query = match q.map(str::trim) {
        Some(text) if !text.is_empty() => Query::Content(text.to_string()),
        _ => Query::MatchAll,
    };
    let page = page
        .filter(|p| *p >= 1)
        .map_or(1, |p| usize::try_from(p).unwrap_or(usize::MAX));

    QuerySpec {
        query,
        facets: vec![
            Facet {
                field: FacetField::Tag,
                size: FACET_SIZE,
            },
            Facet {
                field: FacetField::Domain,
                size: FACET_SIZE,
            },
        ],
        from: (page - 1).saturating_mul(page_size),
        size: page_size,
        sort: vec![SortKey::Score, SortKey::TitleSort],
        highlight: highlight.then(Highlight::default),
    }
}

/// A query that fetches only facet counts over every document.
pub fn facets_only() -> QuerySpec {
    build_query(None, None, 0, false)
}

/// A facet value and its document count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// One rendered page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub q: Option<String>,
    pub results: Vec<DisplayDocument>,
    /// Tags that would narrow the result set.
    pub tags: Vec<FacetCount>,
    pub domains: Vec<FacetCount>,
    pub total: u64,
    pub page: usize,
    pub pages: u64,
}

/// Facet buckets ordered by descending count, then ascending value.
pub fn ranked(counts: &HashMap<String, u64>) -> Vec<FacetCount> {
    let mut out: Vec<FacetCount> = counts
        .iter()
        .map(|(value, count)| FacetCount {
            value: value.clone(),
            count: *count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    out
}

/// Tags worth offering as refinements: a tag present on every result
/// narrows nothing and is dropped.
pub fn restricting_tags(counts: &HashMap<String, u64>, total: u64) -> Vec<FacetCount> {
    ranked(counts)
        .into_iter()
        .filter(|f| f.count != total)
        .collect()
}

pub fn total_pages(total: u64, page_size: usize) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}

/// Turns a raw store response into a display page.
pub fn assemble_page(spec: &QuerySpec, response: SearchResponse) -> SearchPage {
    let results = response
        .hits
        .iter()
        .map(|hit| to_display(&hit.document, hit.fragment.as_deref()))
        .collect();

    SearchPage {
        q: match &spec.query {
            Query::MatchAll => None,
            Query::Content(text) => Some(text.clone()),
        },
        results,
        tags: restricting_tags(&response.tags, response.total),
        domains: ranked(&response.domains),
        total: response.total,
        page: spec.page(),
        pages: total_pages(response.total, spec.size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Submission;
    use crate::present::to_stored;
    use crate::store::SearchHit;

    fn counts(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn blank_query_matches_everything() {
        assert_eq!(build_query(None, None, 20, false).query, Query::MatchAll);
        assert_eq!(build_query(Some("   "), None, 20, false).query, Query::MatchAll);
        assert_eq!(
            build_query(Some(" rust "), None, 20, false).query,
            Query::Content("rust".to_string())
        );
    }

    #[test]
    fn invalid_pages_clamp_to_first() {
        for page in [None, Some(0), Some(-4)] {
            let spec = build_query(None, page, 20, false);
            assert_eq!(spec.from, 0);
            assert_eq!(spec.page(), 1);
        }
        let spec = build_query(None, Some(3), 20, false);
        assert_eq!(spec.from, 40);
        assert_eq!(spec.size, 20);
        assert_eq!(spec.page(), 3);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let spec = build_query(None, Some(i64::MAX), 20, false);
        assert_eq!(spec.from, usize::MAX);
        assert_eq!(spec.size, 20);
        assert!(spec.page() > 1);
    }

    #[test]
    fn facets_and_sort_are_fixed() {
        let spec = build_query(Some("x"), None, 20, true);
        assert_eq!(spec.facet_size(FacetField::Tag), Some(FACET_SIZE));
        assert_eq!(spec.facet_size(FacetField::Domain), Some(FACET_SIZE));
        assert_eq!(spec.sort, vec![SortKey::Score, SortKey::TitleSort]);
        let h = spec.highlight.unwrap();
        assert_eq!(h.fragment_size, 300);
        assert_eq!((h.pre_tag, h.post_tag), ("<mark>", "</mark>"));
        assert!(build_query(Some("x"), None, 20, false).highlight.is_none());
    }

    #[test]
    fn renders_elasticsearch_body() {
        let body = build_query(Some("dragons"), Some(2), 20, true).to_json();
        assert_eq!(
            body["query"]["bool"]["must"][0]["query_string"]["query"],
            "dragons"
        );
        assert_eq!(body["aggs"]["tags"]["terms"]["field"], "tag");
        assert_eq!(body["aggs"]["domains"]["terms"]["size"], 500);
        assert_eq!(body["from"], 20);
        assert_eq!(body["sort"], json!(["_score", "title_sort"]));
        assert_eq!(body["highlight"]["fragment_size"], 300);

        let all = build_query(None, None, 20, false).to_json();
        assert!(all["query"]["bool"]["must"][0].get("match_all").is_some());
        assert!(all.get("highlight").is_none());
    }

    #[test]
    fn restricting_tags_drop_universal_ones() {
        let tags = counts(&[("rpg", 10), ("dnd", 4), ("osr", 7), ("blog", 4)]);
        let out = restricting_tags(&tags, 10);
        let values: Vec<_> = out.iter().map(|f| (f.value.as_str(), f.count)).collect();
        assert_eq!(values, vec![("osr", 7), ("blog", 4), ("dnd", 4)]);
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn assemble_page_presents_hits() {
        let doc = to_stored(
            Submission::single("Hello", "https://example.com/")
                .with_tags(["a", "b"])
                .with_content("hello world end"),
            false,
        )
        .unwrap();
        let response = SearchResponse {
            hits: vec![SearchHit {
                document: doc,
                score: 1.5,
                fragment: Some("<mark>world</mark>".to_string()),
            }],
            tags: counts(&[("a", 1), ("b", 1)]),
            domains: counts(&[("example.com", 1)]),
            total: 1,
        };
        let spec = build_query(Some("world"), None, 20, true);
        let page = assemble_page(&spec, response);

        assert_eq!(page.q.as_deref(), Some("world"));
        assert_eq!(page.total, 1);
        assert_eq!(page.pages, 1);
        assert!(page.tags.is_empty());
        assert_eq!(page.domains[0].value, "example.com");
        assert_eq!(
            page.results[0].fragment.as_deref(),
            Some("…<mark>world</mark>…")
        );
    }
}
