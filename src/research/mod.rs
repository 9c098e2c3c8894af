//! Research pipeline stages
//!
//! Each stage of a research round is a small service wrapping one external
//! collaborator (Model Service, Search Service or the web itself):
//!
//! - [`optimizer::QueryOptimizer`] - topic to focused query and research brief
//! - [`search::SearchRetriever`] - query to normalized search results
//! - [`ranker::RelevanceRanker`] - per-URL relevance scores
//! - [`selector::DiversitySelector`] - bounded, host-diverse subset
//! - [`fetcher::ContentFetcher`] - full text with snippet fallback
//! - [`synthesizer::ReportSynthesizer`] - structured report
//! - [`followup::FollowUpGenerator`] - next search terms
//!
//! Model output is decoded through [`decode::decode_structured`]. The
//! stages are bundled into [`ResearchServices`] for the graph manager.

pub mod decode;
pub mod fetcher;
pub mod followup;
pub mod optimizer;
pub mod ranker;
pub mod search;
pub mod selector;
pub mod synthesizer;

use crate::llm::LLMClient;
use crate::retry::RetryPolicy;
use crate::types::{Result, SearchProviderKind};
use crate::utils::toml_config::ResearchConfig;
use std::sync::Arc;

pub use fetcher::{ContentFetcher, FetchedSource, HttpContentFetcher};
pub use followup::FollowUpGenerator;
pub use optimizer::QueryOptimizer;
pub use ranker::RelevanceRanker;
pub use search::{SearchBackend, SearchRetriever};
pub use selector::DiversitySelector;
pub use synthesizer::{ReportDraft, ReportSynthesizer};

/// Every pipeline stage, wired to one model client and retry policy
pub struct ResearchServices {
    pub optimizer: QueryOptimizer,
    pub retriever: SearchRetriever,
    pub ranker: RelevanceRanker,
    pub selector: DiversitySelector,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub synthesizer: ReportSynthesizer,
    pub followup: FollowUpGenerator,
    pub retry: RetryPolicy,
}

impl ResearchServices {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        retriever: SearchRetriever,
        fetcher: Arc<dyn ContentFetcher>,
        selector: DiversitySelector,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            optimizer: QueryOptimizer::new(llm.clone(), retry),
            ranker: RelevanceRanker::new(llm.clone(), retry),
            synthesizer: ReportSynthesizer::new(llm.clone(), retry),
            followup: FollowUpGenerator::new(llm, retry),
            retriever,
            fetcher,
            selector,
            retry,
        }
    }

    /// Build the stages from configuration: DuckDuckGo is always available
    /// (with the `duckduckgo` feature), Bing when `[search.bing]` is set.
    pub fn from_config(config: &ResearchConfig, llm: Arc<dyn LLMClient>) -> Result<Self> {
        let mut retriever = SearchRetriever::new(config.retry);

        #[cfg(feature = "duckduckgo")]
        retriever.register(
            SearchProviderKind::DuckDuckGo,
            Arc::new(search::DuckDuckGoSearch::new(config.search.num_results)),
        );

        if let Some(bing) = &config.search.bing {
            let api_key = config.require_env(&bing.api_key_env)?;
            retriever.register(
                SearchProviderKind::Bing,
                Arc::new(search::BingSearch::new(
                    bing.endpoint.clone(),
                    api_key,
                    config.search.num_results,
                )),
            );
        }

        let fetcher = Arc::new(HttpContentFetcher::new(config.research.max_content_chars)?);
        let selector = DiversitySelector::new(config.research.max_sources, config.research.min_score);

        Ok(Self::new(llm, retriever, fetcher, selector, config.retry))
    }
}
