//! Site-specific page text extraction.
//!
//! An [`ExtractorTable`] is an ordered list of `(prefix, SiteExtractor)`
//! pairs. [`ExtractorTable::resolve`] scans it linearly and the first
//! prefix that matches wins; URLs matching nothing use
//! [`SiteExtractor::Default`], which keeps all visible text of the page.
//!
//! Site strategies come in two kinds:
//!
//! - **HTML**: fetch the page once, then pick the interesting element(s)
//!   with CSS selectors.
//! - **API**: ask a JSON endpoint of the site (Reddit, GOV.UK, YouTube)
//!   for the text directly.
//!
//! A strategy that fails or finds no text falls back to the default
//! extractor. Such fallbacks are logged at `warn` and never propagate.

use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::Fetcher;

/// Elements whose text is never shown to a reader.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Wikipedia page chrome dropped from the article body.
const WIKIPEDIA_CHROME: &str =
    "div.toc, table.metadata, table.vertical-navbox, span.mw-editsection, div.printfooter";

const GOVUK_ORIGIN: &str = "https://www.gov.uk";
const YOUTUBE_VIDEOS_API: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Extraction strategy for one family of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteExtractor {
    /// All visible text of the page.
    Default,
    /// The element with id `post-{id}`, where `id` is the path segment
    /// after the first one (WordPress permalinks).
    PostById,
    /// The first element matching a CSS selector.
    FirstMatch(&'static str),
    ArtOfManliness,
    /// The Forge (indie-rpgs.com) article layout.
    Forge,
    GovUk,
    Reddit,
    Wikipedia,
    YouTube,
}

/// Ordered prefix table. First match wins.
#[derive(Debug, Clone)]
pub struct ExtractorTable {
    entries: Vec<(&'static str, SiteExtractor)>,
}

impl ExtractorTable {
    pub fn new(entries: Vec<(&'static str, SiteExtractor)>) -> Self {
        Self { entries }
    }

    /// The built-in site list.
    pub fn standard() -> Self {
        use SiteExtractor::*;

        Self::new(vec![
            ("https://thealexandrian.net/wordpress/", PostById),
            ("https://theangrygm.com/", FirstMatch("article")),
            ("https://www.artofmanliness.com/articles/", ArtOfManliness),
            ("http://indie-rpgs.com/articles/", Forge),
            ("http://goblinpunch.blogspot.com/", FirstMatch(".post-body")),
            ("https://www.gov.uk/", GovUk),
            ("https://cheatsheetseries.owasp.org/cheatsheets/", FirstMatch("article")),
            ("https://reasonablypolymorphic.com/blog/", FirstMatch(".content")),
            ("https://www.reddit.com/r/", Reddit),
            ("https://old.reddit.com/r/", Reddit),
            ("https://blog.regehr.org/archives/", PostById),
            ("https://en.wikipedia.org/wiki/", Wikipedia),
            ("https://www.youtube.com/watch?v=", YouTube),
        ])
    }

    pub fn entries(&self) -> &[(&'static str, SiteExtractor)] {
        &self.entries
    }

    pub fn resolve(&self, url: &str) -> SiteExtractor {
        self.entries
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix))
            .map(|(_, extractor)| *extractor)
            .unwrap_or(SiteExtractor::Default)
    }
}

impl Default for ExtractorTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What an extractor needs besides the URL.
pub struct ExtractContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub youtube_api_key: Option<&'a str>,
}

impl SiteExtractor {
    /// Fetches `url` and returns its text. Empty if nothing could be
    /// retrieved at all.
    pub async fn extract(&self, url: &str, ctx: &ExtractContext<'_>) -> String {
        match self {
            SiteExtractor::GovUk => match govuk_text(url, ctx.fetcher).await {
                Some(text) => text,
                None => fallback(url, "gov.uk api", ctx).await,
            },
            SiteExtractor::Reddit => match reddit_text(url, ctx.fetcher).await {
                Some(text) => text,
                None => fallback(url, "reddit api", ctx).await,
            },
            SiteExtractor::YouTube => match youtube_text(url, ctx).await {
                Some(text) => text,
                None => fallback(url, "youtube api", ctx).await,
            },
            html_strategy => {
                let Some(page) = ctx.fetcher.fetch(url).await else {
                    return String::new();
                };
                html_strategy.extract_html(url, &page)
            }
        }
    }

    /// Applies an HTML strategy to an already-fetched page, falling back
    /// to the visible text of the whole page.
    pub fn extract_html(&self, url: &str, page: &str) -> String {
        let document = Html::parse_document(page);
        if *self != SiteExtractor::Default {
            match self.targeted(url, &document) {
                Some(text) if !text.trim().is_empty() => return text,
                _ => warn!(url, strategy = ?self, "site extraction found nothing, using page text"),
            }
        }
        visible_text(document.root_element(), &|_| false)
    }

    fn targeted(&self, url: &str, document: &Html) -> Option<String> {
        let root = document.root_element();
        match self {
            SiteExtractor::PostById => {
                let id = url.split('/').nth(4).filter(|s| !s.is_empty())?;
                let post = nth_match(root, &format!("[id=\"post-{id}\"]"), 0)?;
                Some(visible_text(post, &|_| false))
            }
            SiteExtractor::FirstMatch(css) => {
                Some(visible_text(nth_match(root, css, 0)?, &|_| false))
            }
            SiteExtractor::ArtOfManliness => {
                let header = nth_match(root, ".post-title", 0)?;
                let body = nth_match(root, ".post-content-column", 0)?;
                let body_text = visible_text(body, &|el| el.value().name() == "div");
                Some(format!("{}\n{}", visible_text(header, &|_| false), body_text))
            }
            SiteExtractor::Forge => {
                let title = nth_match(root, ".maintitle", 1)?;
                let body = nth_match(root, ".gen", 2)?;
                let nav: Vec<_> = [
                    nth_match(body, "td[align=\"left\"]", 0),
                    nth_match(body, "td[align=\"right\"]", 0),
                ]
                .into_iter()
                .flatten()
                .map(|el| el.id())
                .collect();
                let body_text = visible_text(body, &|el| nav.contains(&el.id()));
                Some(format!(
                    "{}\n{}",
                    visible_text(title, &|_| false),
                    body_text.replace('\r', "\n")
                ))
            }
            SiteExtractor::Wikipedia => {
                let title = nth_match(root, "#firstHeading", 0)?;
                let body = nth_match(root, "#mw-content-text", 0)?;
                let chrome = Selector::parse(WIKIPEDIA_CHROME).ok()?;
                let body_text = visible_text(body, &|el| chrome.matches(el));
                Some(format!("{}\n{}", visible_text(title, &|_| false), body_text))
            }
            SiteExtractor::Default
            | SiteExtractor::GovUk
            | SiteExtractor::Reddit
            | SiteExtractor::YouTube => None,
        }
    }
}

async fn fallback(url: &str, strategy: &str, ctx: &ExtractContext<'_>) -> String {
    warn!(url, strategy, "site api returned nothing, falling back to page text");
    match ctx.fetcher.fetch(url).await {
        Some(page) => SiteExtractor::Default.extract_html(url, &page),
        None => String::new(),
    }
}

/// The `n`-th descendant of `root` matching `css`.
fn nth_match<'a>(root: ElementRef<'a>, css: &str, n: usize) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    root.select(&selector).nth(n)
}

/// Concatenated text under `element`, skipping hidden elements and any
/// element for which `skip` returns true.
pub fn visible_text(element: ElementRef<'_>, skip: &dyn Fn(&ElementRef<'_>) -> bool) -> String {
    let mut buf = String::new();
    collect_text(element, skip, &mut buf);
    buf
}

fn collect_text(
    element: ElementRef<'_>,
    skip: &dyn Fn(&ElementRef<'_>) -> bool,
    buf: &mut String,
) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buf.push_str(text),
            Node::Element(el) => {
                if HIDDEN_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    if !skip(&child_ref) {
                        collect_text(child_ref, skip, buf);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Text of an HTML fragment such as an API-provided body.
fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    visible_text(fragment.root_element(), &|_| false)
}

async fn fetch_json(fetcher: &dyn Fetcher, url: &str) -> Option<Value> {
    let body = fetcher.fetch(url).await?;
    match serde_json::from_str(&body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(url, error = %e, "response was not json");
            None
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

pub fn reddit_json_url(url: &str) -> String {
    format!("{}/.json", url.trim_end_matches('/'))
}

async fn reddit_text(url: &str, fetcher: &dyn Fetcher) -> Option<String> {
    let listing = fetch_json(fetcher, &reddit_json_url(url)).await?;
    let selftext = listing.pointer("/0/data/children/0/data/selftext")?.as_str()?;
    non_empty(selftext.to_string())
}

pub fn govuk_search_url(path: &str) -> Option<String> {
    Url::parse_with_params(
        &format!("{GOVUK_ORIGIN}/api/search.json"),
        &[("filter_link", path), ("fields", "title,indexable_content")],
    )
    .ok()
    .map(String::from)
}

async fn govuk_text(url: &str, fetcher: &dyn Fetcher) -> Option<String> {
    let path = url.strip_prefix(GOVUK_ORIGIN)?;

    if let Some(search_url) = govuk_search_url(path) {
        if let Some(results) = fetch_json(fetcher, &search_url).await {
            let title = results.pointer("/results/0/title").and_then(Value::as_str);
            let content = results
                .pointer("/results/0/indexable_content")
                .and_then(Value::as_str);
            if let (Some(title), Some(content)) = (title, content) {
                if let Some(text) = non_empty(format!("{title}\n{content}")) {
                    return Some(text);
                }
            }
        }
    }

    debug!(url, "gov.uk search api had no result, trying content api");
    let content = fetch_json(fetcher, &format!("{GOVUK_ORIGIN}/api/content{path}")).await?;
    let body = content.pointer("/details/body")?.as_str()?;
    non_empty(fragment_text(body))
}

pub fn youtube_video_id(url: &str) -> Option<&str> {
    url.split("v=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .filter(|id| !id.is_empty())
}

pub fn youtube_api_url(video_id: &str, api_key: &str) -> Option<String> {
    Url::parse_with_params(
        YOUTUBE_VIDEOS_API,
        &[("part", "snippet"), ("id", video_id), ("key", api_key)],
    )
    .ok()
    .map(String::from)
}

async fn youtube_text(url: &str, ctx: &ExtractContext<'_>) -> Option<String> {
    let Some(api_key) = ctx.youtube_api_key else {
        warn!(url, "no youtube api key configured");
        return None;
    };
    let api_url = youtube_api_url(youtube_video_id(url)?, api_key)?;
    let response = fetch_json(ctx.fetcher, &api_url).await?;
    let snippet = response.pointer("/items/0/snippet")?;
    non_empty(format!(
        "{}\n{}\n{}",
        str_field(snippet, "title"),
        str_field(snippet, "channelTitle"),
        str_field(snippet, "description")
    ))
}

fn str_field<'a>(value: &'a Value, name: &str) -> &'a str {
    value.get(name).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by exact URL and records every request.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pages: HashMap<String, String>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn with(mut self, url: &str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub(crate) fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Option<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned()
        }
    }

    fn ctx(fetcher: &FakeFetcher) -> ExtractContext<'_> {
        ExtractContext {
            fetcher,
            youtube_api_key: None,
        }
    }

    #[test]
    fn first_matching_prefix_wins() {
        let table = ExtractorTable::new(vec![
            ("https://example.com/", SiteExtractor::FirstMatch("article")),
            ("https://example.com/blog/", SiteExtractor::Wikipedia),
        ]);
        assert_eq!(
            table.resolve("https://example.com/blog/post"),
            SiteExtractor::FirstMatch("article")
        );
        assert_eq!(table.resolve("https://other.org/"), SiteExtractor::Default);
    }

    #[test]
    fn standard_table_routes_known_sites() {
        let table = ExtractorTable::standard();
        assert_eq!(
            table.resolve("https://old.reddit.com/r/rpg/comments/abc/title"),
            SiteExtractor::Reddit
        );
        assert_eq!(
            table.resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SiteExtractor::YouTube
        );
        assert_eq!(
            table.resolve("https://blog.regehr.org/archives/1234"),
            SiteExtractor::PostById
        );
        assert_eq!(table.resolve("https://www.youtube.com/@channel"), SiteExtractor::Default);
        assert_eq!(table.entries().len(), 13);
    }

    #[test]
    fn default_text_skips_scripts_and_styles() {
        let page = "<html><head><style>p{}</style><script>var x;</script></head>\
                    <body><p>Hello <b>world</b></p><noscript>js off</noscript></body></html>";
        let text = SiteExtractor::Default.extract_html("https://example.com", page);
        assert!(text.contains("Hello world"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
        assert!(!text.contains("js off"));
    }

    #[test]
    fn post_by_id_uses_path_segment() {
        let page = r#"<html><body><div id="nav">Menu</div>
            <div id="post-1234"><p>The post</p></div></body></html>"#;
        let text = SiteExtractor::PostById
            .extract_html("https://blog.regehr.org/archives/1234", page);
        assert_eq!(text.trim(), "The post");
    }

    #[test]
    fn missing_selector_falls_back_to_page_text() {
        let page = "<html><body><p>No article here</p></body></html>";
        let text =
            SiteExtractor::FirstMatch("article").extract_html("https://theangrygm.com/x", page);
        assert_eq!(text.trim(), "No article here");

        let text = SiteExtractor::PostById.extract_html("https://blog.regehr.org/", page);
        assert_eq!(text.trim(), "No article here");
    }

    #[test]
    fn wikipedia_drops_page_chrome() {
        let page = r#"<html><body>
            <h1 id="firstHeading">Owlbear</h1>
            <div id="mw-content-text">
              <div class="toc">Contents</div>
              <p>An owlbear is a creature<span class="mw-editsection">[edit]</span>.</p>
              <div class="printfooter">Retrieved from</div>
            </div></body></html>"#;
        let text =
            SiteExtractor::Wikipedia.extract_html("https://en.wikipedia.org/wiki/Owlbear", page);
        assert!(text.starts_with("Owlbear\n"));
        assert!(text.contains("An owlbear is a creature."));
        assert!(!text.contains("Contents"));
        assert!(!text.contains("[edit]"));
        assert!(!text.contains("Retrieved from"));
    }

    #[test]
    fn art_of_manliness_drops_nested_divs() {
        let page = r#"<html><body>
            <h1 class="post-title">How to Tie a Tie</h1>
            <div class="post-content-column"><p>Step one.</p><div>Advert</div></div>
            </body></html>"#;
        let text = SiteExtractor::ArtOfManliness
            .extract_html("https://www.artofmanliness.com/articles/tie", page);
        assert!(text.starts_with("How to Tie a Tie\n"));
        assert!(text.contains("Step one."));
        assert!(!text.contains("Advert"));
    }

    #[test]
    fn forge_strips_navigation_cells() {
        let page = "<html><body>\
            <span class=\"maintitle\">The Forge</span><span class=\"maintitle\">System Does Matter</span>\
            <span class=\"gen\">a</span><span class=\"gen\">b</span>\
            <table class=\"gen\"><tr><td align=\"left\">Prev</td><td>Line one\rLine two</td><td align=\"right\">Next</td></tr></table>\
            </body></html>";
        let text = SiteExtractor::Forge.extract_html("http://indie-rpgs.com/articles/1/", page);
        assert!(text.starts_with("System Does Matter\n"));
        assert!(text.contains("Line one\nLine two"));
        assert!(!text.contains("Prev"));
        assert!(!text.contains("Next"));
    }

    #[tokio::test]
    async fn html_strategy_returns_empty_when_unreachable() {
        let fetcher = FakeFetcher::default();
        let text = SiteExtractor::Default
            .extract("https://example.com/gone", &ctx(&fetcher))
            .await;
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn reddit_reads_selftext() {
        let url = "https://www.reddit.com/r/rpg/comments/abc/title/";
        let fetcher = FakeFetcher::default().with(
            &reddit_json_url(url),
            r#"[{"data": {"children": [{"data": {"selftext": "Post body"}}]}}]"#,
        );
        let text = SiteExtractor::Reddit.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text, "Post body");
        assert_eq!(
            fetcher.requested(),
            vec!["https://www.reddit.com/r/rpg/comments/abc/title/.json"]
        );
    }

    #[tokio::test]
    async fn reddit_link_post_falls_back_to_page() {
        let url = "https://www.reddit.com/r/rpg/comments/abc/title";
        let fetcher = FakeFetcher::default()
            .with(
                &reddit_json_url(url),
                r#"[{"data": {"children": [{"data": {"selftext": ""}}]}}]"#,
            )
            .with(url, "<html><body>Link post page</body></html>");
        let text = SiteExtractor::Reddit.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text.trim(), "Link post page");
    }

    #[tokio::test]
    async fn govuk_prefers_search_api() {
        let url = "https://www.gov.uk/guidance/passports";
        let fetcher = FakeFetcher::default().with(
            &govuk_search_url("/guidance/passports").unwrap(),
            r#"{"results": [{"title": "Passports", "indexable_content": "Apply online."}]}"#,
        );
        let text = SiteExtractor::GovUk.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text, "Passports\nApply online.");
    }

    #[tokio::test]
    async fn govuk_falls_back_to_content_api() {
        let url = "https://www.gov.uk/guidance/passports";
        let fetcher = FakeFetcher::default()
            .with(&govuk_search_url("/guidance/passports").unwrap(), r#"{"results": []}"#)
            .with(
                "https://www.gov.uk/api/content/guidance/passports",
                r#"{"details": {"body": "<p>From the <em>content</em> api</p>"}}"#,
            );
        let text = SiteExtractor::GovUk.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text, "From the content api");
    }

    #[tokio::test]
    async fn govuk_blank_search_result_tries_content_api() {
        let url = "https://www.gov.uk/guidance/passports";
        let fetcher = FakeFetcher::default()
            .with(
                &govuk_search_url("/guidance/passports").unwrap(),
                r#"{"results": [{"title": "", "indexable_content": " "}]}"#,
            )
            .with(
                "https://www.gov.uk/api/content/guidance/passports",
                r#"{"details": {"body": "<p>Body text</p>"}}"#,
            )
            .with(url, "<html><body>Page text</body></html>");
        let text = SiteExtractor::GovUk.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text, "Body text");
        assert!(!fetcher.requested().contains(&url.to_string()));
    }

    #[tokio::test]
    async fn youtube_without_key_uses_page_text() {
        let url = "https://www.youtube.com/watch?v=abc123&t=10";
        let fetcher = FakeFetcher::default().with(url, "<html><body>Video page</body></html>");
        let text = SiteExtractor::YouTube.extract(url, &ctx(&fetcher)).await;
        assert_eq!(text.trim(), "Video page");
        assert_eq!(fetcher.requested(), vec![url]);
    }

    #[tokio::test]
    async fn youtube_reads_snippet() {
        let url = "https://www.youtube.com/watch?v=abc123&t=10";
        assert_eq!(youtube_video_id(url), Some("abc123"));
        let fetcher = FakeFetcher::default().with(
            &youtube_api_url("abc123", "k").unwrap(),
            r#"{"items": [{"snippet": {"title": "T", "channelTitle": "C", "description": "D"}}]}"#,
        );
        let ctx = ExtractContext {
            fetcher: &fetcher,
            youtube_api_key: Some("k"),
        };
        let text = SiteExtractor::YouTube.extract(url, &ctx).await;
        assert_eq!(text, "T\nC\nD");
    }
}
