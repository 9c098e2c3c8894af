//! Search Retriever
//!
//! Issues a query to one of the configured Search Services and normalizes
//! the hits into [`SearchResult`]s with a zero score. Results are returned
//! as the provider ordered them; deduplication against an existing result
//! set is left to the caller.

use crate::retry::{with_retry, RetryPolicy};
use crate::types::{AppError, Result, SearchProviderKind, SearchResult, TimeFilter};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Host reserved for canned results; rankers recognize it as test input
pub const TEST_HOST: &str = "test.ares.invalid";

/// A Search Service
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, time_filter: TimeFilter) -> Result<Vec<SearchResult>>;

    fn name(&self) -> &str;
}

/// Deterministic results for the `test` query, carrying inline content so
/// that no page fetch is needed either
pub fn canned_results() -> Vec<SearchResult> {
    let pages = [
        (
            "test-1",
            "overview",
            "Test Overview",
            "An overview of the canned test topic.",
        ),
        (
            "test-2",
            "details",
            "Test Details",
            "Details about the canned test topic.",
        ),
        (
            "test-3",
            "background",
            "Test Background",
            "Background material on the canned test topic.",
        ),
    ];

    pages
        .into_iter()
        .map(|(id, slug, title, snippet)| {
            let mut result =
                SearchResult::new(id, format!("https://{}/{}", TEST_HOST, slug), title, snippet);
            result.content = Some(format!("{} {}", title, snippet));
            result
        })
        .collect()
}

/// Routes queries to search backends by provider kind
pub struct SearchRetriever {
    backends: HashMap<SearchProviderKind, Arc<dyn SearchBackend>>,
    retry: RetryPolicy,
}

impl SearchRetriever {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            backends: HashMap::new(),
            retry,
        }
    }

    pub fn with_backend(mut self, kind: SearchProviderKind, backend: Arc<dyn SearchBackend>) -> Self {
        self.register(kind, backend);
        self
    }

    pub fn register(&mut self, kind: SearchProviderKind, backend: Arc<dyn SearchBackend>) {
        self.backends.insert(kind, backend);
    }

    /// Search with the chosen provider. `is_test` (or the literal query
    /// `test`) returns [`canned_results`] without touching the network.
    pub async fn search(
        &self,
        query: &str,
        time_filter: TimeFilter,
        provider: SearchProviderKind,
        is_test: bool,
    ) -> Result<Vec<SearchResult>> {
        if is_test || query.trim() == "test" {
            tracing::debug!("Test query, returning canned search results");
            return Ok(canned_results());
        }

        let backend = self.backends.get(&provider).ok_or_else(|| {
            AppError::Configuration(format!("Search provider '{}' is not configured", provider))
        })?;

        let mut results =
            with_retry(&self.retry, || backend.search(query, time_filter)).await?;
        for result in &mut results {
            result.score = 0.0;
        }

        tracing::info!(
            provider = backend.name(),
            query,
            count = results.len(),
            "Search completed"
        );
        Ok(results)
    }
}

// ============= DuckDuckGo (daedra) =============

/// DuckDuckGo search through daedra; no API key required
#[cfg(feature = "duckduckgo")]
pub struct DuckDuckGoSearch {
    num_results: usize,
}

#[cfg(feature = "duckduckgo")]
impl DuckDuckGoSearch {
    pub fn new(num_results: usize) -> Self {
        Self { num_results }
    }
}

#[cfg(feature = "duckduckgo")]
#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(&self, query: &str, time_filter: TimeFilter) -> Result<Vec<SearchResult>> {
        if time_filter != TimeFilter::All {
            tracing::debug!(%time_filter, "DuckDuckGo backend ignores time filters");
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: self.num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Upstream(format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .enumerate()
            .map(|(i, r)| {
                SearchResult::new(
                    format!("ddg-{}", i),
                    r.url.clone(),
                    r.title.clone(),
                    r.description.clone(),
                )
            })
            .collect())
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

// ============= Bing-compatible HTTP search =============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    web_pages: Option<BingWebPages>,
}

#[derive(Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Deserialize)]
struct BingPage {
    #[serde(default)]
    id: Option<String>,
    url: String,
    name: String,
    #[serde(default)]
    snippet: String,
}

/// Web search against a Bing-compatible endpoint (`webPages.value[]`)
pub struct BingSearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    num_results: usize,
}

impl BingSearch {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, num_results: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            num_results,
        }
    }

    /// `freshness` parameter for a time filter, relative to `today`
    pub fn freshness(time_filter: TimeFilter, today: NaiveDate) -> Option<String> {
        match time_filter {
            TimeFilter::Day => Some("Day".to_string()),
            TimeFilter::Week => Some("Week".to_string()),
            TimeFilter::Month => Some("Month".to_string()),
            TimeFilter::Year => {
                let from = today - Duration::days(365);
                Some(format!("{}..{}", from.format("%Y-%m-%d"), today.format("%Y-%m-%d")))
            }
            TimeFilter::All => None,
        }
    }
}

#[async_trait]
impl SearchBackend for BingSearch {
    async fn search(&self, query: &str, time_filter: TimeFilter) -> Result<Vec<SearchResult>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("count", self.num_results.to_string()),
            ("mkt", "en-US".to_string()),
        ];
        if let Some(freshness) = Self::freshness(time_filter, Utc::now().date_naive()) {
            params.push(("freshness", freshness));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let body: BingResponse = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("Search response: {}", e)))?;

        Ok(body
            .web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                let id = page.id.unwrap_or_else(|| format!("bing-{}", i));
                SearchResult::new(id, page.url, page.name, page.snippet)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "bing"
    }
}
