//! Content Fetcher
//!
//! Resolves full text for selected sources. A failed or empty fetch is not
//! an error: [`fetch_sources`] substitutes the search snippet and marks the
//! source [`SourceStatus::Preview`]. Sources that already carry inline
//! content are used as-is without a fetch.

use crate::retry::{with_retry, RetryPolicy};
use crate::types::{AppError, Result, SearchResult, SourceStatus};
use async_trait::async_trait;
use futures::future::join_all;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Page retrieval seam
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Best-effort extracted text for `url`; `Ok(None)` when the page has
    /// no usable text
    async fn fetch(&self, url: &str) -> Result<Option<String>>;
}

/// A selected source paired with the text synthesis will read
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSource {
    pub result: SearchResult,
    pub content: String,
    pub status: SourceStatus,
}

/// Fetch every source concurrently; failures degrade to the snippet and
/// never affect sibling fetches.
pub async fn fetch_sources(
    fetcher: &dyn ContentFetcher,
    retry: &RetryPolicy,
    sources: &[SearchResult],
) -> Vec<FetchedSource> {
    let fetches = sources.iter().map(|source| async move {
        if let Some(content) = source.content.as_ref().filter(|c| !c.trim().is_empty()) {
            return FetchedSource {
                result: source.clone(),
                content: content.clone(),
                status: SourceStatus::Fetched,
            };
        }

        match with_retry(retry, || fetcher.fetch(&source.url)).await {
            Ok(Some(content)) if !content.trim().is_empty() => FetchedSource {
                result: source.clone(),
                content,
                status: SourceStatus::Fetched,
            },
            outcome => {
                match outcome {
                    Err(e) => tracing::warn!(url = %source.url, "Content fetch failed, using snippet: {}", e),
                    _ => tracing::warn!(url = %source.url, "No extractable content, using snippet"),
                }
                FetchedSource {
                    result: source.clone(),
                    content: source.snippet.clone(),
                    status: SourceStatus::Preview,
                }
            }
        }
    });

    join_all(fetches).await
}

/// Downloads pages over HTTP and extracts readable text
pub struct HttpContentFetcher {
    http: reqwest::Client,
    max_chars: usize,
}

impl HttpContentFetcher {
    pub fn new(max_chars: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("ares-research/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, max_chars })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        let response = self.http.get(url).send().await?.error_for_status()?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);
        let body = response.text().await?;

        let text = if is_html {
            extract_text(&body)
        } else {
            collapse_whitespace(&body)
        };

        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(truncate_chars(text, self.max_chars)))
    }
}

const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "svg", "form",
];

/// Readable text of an HTML document: `<article>`/`<main>` when present,
/// otherwise `<body>`, minus scripts, styles and page chrome
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = ["article", "main", "body"].iter().find_map(|tag| {
        Selector::parse(tag)
            .ok()
            .and_then(|selector| document.select(&selector).next())
    });

    let mut buffer = String::new();
    match root {
        Some(element) => collect_text(element, &mut buffer),
        None => buffer.push_str(&document.root_element().text().collect::<Vec<_>>().join(" ")),
    }
    collapse_whitespace(&buffer)
}

fn collect_text(element: ElementRef<'_>, buffer: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                buffer.push_str(text);
                buffer.push(' ');
            }
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, buffer);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn source(id: &str, url: &str) -> SearchResult {
        SearchResult::new(id, url, id, format!("snippet of {}", id))
    }

    #[tokio::test]
    async fn test_partial_failures_degrade_to_preview() {
        let mut fetcher = MockContentFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq("https://a.com"))
            .returning(|_| Ok(Some("full text a".to_string())));
        fetcher
            .expect_fetch()
            .with(eq("https://b.com"))
            .returning(|_| Err(AppError::Upstream("connection reset".to_string())));
        fetcher
            .expect_fetch()
            .with(eq("https://c.com"))
            .returning(|_| Ok(None));

        let sources = vec![
            source("a", "https://a.com"),
            source("b", "https://b.com"),
            source("c", "https://c.com"),
        ];
        let fetched = fetch_sources(&fetcher, &RetryPolicy::default(), &sources).await;

        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].status, SourceStatus::Fetched);
        assert_eq!(fetched[0].content, "full text a");
        assert_eq!(fetched[1].status, SourceStatus::Preview);
        assert_eq!(fetched[1].content, "snippet of b");
        assert_eq!(fetched[2].status, SourceStatus::Preview);
    }

    #[tokio::test]
    async fn test_inline_content_skips_fetch() {
        let mut fetcher = MockContentFetcher::new();
        fetcher.expect_fetch().never();

        let mut doc = source("doc", "document://notes");
        doc.content = Some("uploaded text".to_string());

        let fetched = fetch_sources(&fetcher, &RetryPolicy::default(), &[doc]).await;
        assert_eq!(fetched[0].content, "uploaded text");
        assert_eq!(fetched[0].status, SourceStatus::Fetched);
    }

    #[test]
    fn test_extract_text_prefers_article_and_skips_chrome() {
        let html = r#"<html><head><title>t</title><style>p{}</style></head>
            <body><nav>Menu</nav><article><h1>Heading</h1>
            <p>First   paragraph.</p><script>var x = 1;</script><p>Second.</p></article>
            <footer>Copyright</footer></body></html>"#;
        assert_eq!(extract_text(html), "Heading First paragraph. Second.");
    }

    #[test]
    fn test_extract_text_body_fallback() {
        let html = "<html><body><div>Hello <b>world</b></div><footer>x</footer></body></html>";
        assert_eq!(extract_text(html), "Hello world");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé");
        assert_eq!(truncate_chars("hi".to_string(), 10), "hi");
    }
}
