//! Mock implementations for testing.
//!
//! Scripted stand-ins for the Model Service, the Search Service and the
//! content fetcher, so pipeline tests run without any network access.

use ares_research::llm::LLMClient;
use ares_research::research::{
    followup, optimizer, ranker, synthesizer, ContentFetcher, DiversitySelector, ResearchServices,
    SearchBackend, SearchRetriever,
};
use ares_research::retry::RetryPolicy;
use ares_research::types::{AppError, Result, SearchProviderKind, SearchResult, TimeFilter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Pipeline stages, identified by the system prompt they send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Optimize,
    Rank,
    Synthesize,
    Consolidate,
    FollowUp,
}

impl Stage {
    fn from_system(system: &str) -> Option<Self> {
        match system {
            s if s == optimizer::SYSTEM_PROMPT => Some(Self::Optimize),
            s if s == ranker::SYSTEM_PROMPT => Some(Self::Rank),
            s if s == synthesizer::SYSTEM_PROMPT => Some(Self::Synthesize),
            s if s == synthesizer::CONSOLIDATION_SYSTEM_PROMPT => Some(Self::Consolidate),
            s if s == followup::SYSTEM_PROMPT => Some(Self::FollowUp),
            _ => None,
        }
    }
}

enum Reply {
    Text(String),
    Fail,
}

/// Model client answering each stage with a scripted reply.
///
/// Replies can be changed between calls, which lets a test fail a stage
/// and then retry it successfully. Every request is recorded.
#[derive(Default)]
pub struct ScriptedLLMClient {
    replies: Mutex<HashMap<Stage, Reply>>,
    requests: Mutex<Vec<(Stage, String)>>,
}

impl ScriptedLLMClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, stage: Stage, text: impl Into<String>) {
        self.replies.lock().insert(stage, Reply::Text(text.into()));
    }

    /// Make a stage fail with an upstream error
    pub fn fail(&self, stage: Stage) {
        self.replies.lock().insert(stage, Reply::Fail);
    }

    /// Total number of model requests
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn calls_for(&self, stage: Stage) -> usize {
        self.requests.lock().iter().filter(|(s, _)| *s == stage).count()
    }

    /// Prompts sent for a stage, oldest first
    pub fn prompts_for(&self, stage: Stage) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AppError::Internal(
            "pipeline stages always send a system prompt".to_string(),
        ))
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let stage = Stage::from_system(system)
            .ok_or_else(|| AppError::Internal(format!("unknown system prompt: {}", system)))?;
        self.requests.lock().push((stage, prompt.to_string()));

        match self.replies.lock().get(&stage) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail) => Err(AppError::Upstream(format!("{:?} stage unavailable", stage))),
            None => Err(AppError::Internal(format!("no reply scripted for {:?}", stage))),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Search Service returning a fixed result list
pub struct StaticSearch {
    pub results: Vec<SearchResult>,
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, _query: &str, _time_filter: TimeFilter) -> Result<Vec<SearchResult>> {
        Ok(self.results.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Content fetcher backed by a map; unknown URLs fail
#[derive(Default)]
pub struct MapFetcher {
    pages: HashMap<String, Option<String>>,
    requests: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), Some(text.to_string()));
        self
    }

    /// A page that loads but has no readable text
    pub fn empty_page(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), None);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ContentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        self.requests.lock().push(url.to_string());
        match self.pages.get(url) {
            Some(text) => Ok(text.clone()),
            None => Err(AppError::Upstream(format!("connection refused: {}", url))),
        }
    }
}

pub fn result(id: &str, url: &str, snippet: &str) -> SearchResult {
    SearchResult::new(id, url, format!("Title {}", id), snippet)
}

/// Fast retries so rate-limit paths stay quick in tests
pub fn test_retry() -> RetryPolicy {
    RetryPolicy::new(3, 1)
}

/// Services wired to scripted collaborators
pub fn services(
    llm: Arc<ScriptedLLMClient>,
    results: Vec<SearchResult>,
    fetcher: Arc<MapFetcher>,
    selector: DiversitySelector,
) -> Arc<ResearchServices> {
    let retriever = SearchRetriever::new(test_retry())
        .with_backend(SearchProviderKind::DuckDuckGo, Arc::new(StaticSearch { results }));
    Arc::new(ResearchServices::new(
        llm,
        retriever,
        fetcher,
        selector,
        test_retry(),
    ))
}
