//! Relevance Ranker
//!
//! Asks the Model Service to score each candidate against the research
//! prompt. Entries the model leaves out, duplicates, unknown URLs and
//! non-finite scores are ignored; an unscored result simply counts as 0.

use crate::llm::LLMClient;
use crate::research::decode::decode_structured;
use crate::research::search::TEST_HOST;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Ranking, RankingOutcome, Report, Result, SearchResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str = "You are a meticulous research librarian. Judge how relevant each \
source is to the research brief. Respond with JSON only.";

/// Snippet/content characters shown to the model per result
const EXCERPT_CHARS: usize = 500;

pub struct RelevanceRanker {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

/// Lenient mirror of [`RankingOutcome`]: individual entries may be junk
#[derive(Deserialize)]
struct RawRanking {
    #[serde(default)]
    rankings: Vec<serde_json::Value>,
    #[serde(default)]
    analysis: String,
}

impl RelevanceRanker {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn rank(
        &self,
        prompt: &str,
        results: &[SearchResult],
        is_test: bool,
    ) -> Result<RankingOutcome> {
        if results.is_empty() {
            return Ok(RankingOutcome::default());
        }

        if is_test || results.iter().any(|r| is_test_url(&r.url)) {
            tracing::debug!("Test input, returning canned ranking");
            return Ok(canned_ranking(results));
        }

        let request = build_prompt(prompt, results);
        let raw = with_retry(&self.retry, || self.llm.generate_with_system(SYSTEM_PROMPT, &request))
            .await?;
        let parsed: RawRanking = decode_structured(&raw)?;

        let outcome = sanitize(parsed, results);
        tracing::info!(
            candidates = results.len(),
            scored = outcome.rankings.len(),
            "Ranked search results"
        );
        Ok(outcome)
    }
}

pub fn is_test_url(url: &str) -> bool {
    url.contains(TEST_HOST)
}

/// A report built only from the canned test sources
pub fn is_test_report(report: &Report) -> bool {
    !report.sources.is_empty() && report.sources.iter().all(|s| is_test_url(&s.url))
}

/// First result scores 1.0, every other result 0.5
pub fn canned_ranking(results: &[SearchResult]) -> RankingOutcome {
    RankingOutcome {
        rankings: results
            .iter()
            .enumerate()
            .map(|(i, r)| Ranking {
                url: r.url.clone(),
                score: if i == 0 { 1.0 } else { 0.5 },
                reasoning: "Canned test ranking".to_string(),
            })
            .collect(),
        analysis: "Canned test ranking".to_string(),
    }
}

fn sanitize(raw: RawRanking, results: &[SearchResult]) -> RankingOutcome {
    let known: HashSet<&str> = results.iter().map(|r| r.url.as_str()).collect();
    let mut seen = HashSet::new();

    let rankings = raw
        .rankings
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Ranking>(value) {
            Ok(ranking) => Some(ranking),
            Err(e) => {
                tracing::debug!("Skipping unusable ranking entry: {}", e);
                None
            }
        })
        .filter(|r| r.score.is_finite() && known.contains(r.url.as_str()))
        .filter(|r| seen.insert(r.url.clone()))
        .map(|mut r| {
            r.score = r.score.clamp(0.0, 1.0);
            r
        })
        .collect();

    RankingOutcome {
        rankings,
        analysis: raw.analysis,
    }
}

fn build_prompt(prompt: &str, results: &[SearchResult]) -> String {
    let listing = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let excerpt: String = r
                .content
                .as_deref()
                .unwrap_or(&r.snippet)
                .chars()
                .take(EXCERPT_CHARS)
                .collect();
            format!(
                "{}. {}\n   URL: {}\n   Excerpt: {}",
                i + 1,
                r.title,
                r.url,
                excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Research brief: {prompt}

Sources:
{listing}

Return a JSON object:
{{
  "rankings": [{{"url": "<source url>", "score": 0.0-1.0, "reasoning": "<one sentence>"}}],
  "analysis": "<short overall assessment>"
}}"#
    )
}
