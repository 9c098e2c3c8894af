//! Diversity Selector
//!
//! Greedy single pass over ranked results in descending score order
//! (stable, so ties keep the ranker's ordering). A result is accepted when
//! its score is strictly above the threshold, its hostname is not yet
//! represented, and fewer than `max_sources` results have been accepted.
//! There is no backtracking.

use crate::types::{AppError, Result, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiversitySelector {
    pub max_sources: usize,
    pub min_score: f32,
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self {
            max_sources: 3,
            min_score: 0.5,
        }
    }
}

impl DiversitySelector {
    pub fn new(max_sources: usize, min_score: f32) -> Self {
        Self {
            max_sources,
            min_score,
        }
    }

    /// Pick a bounded, domain-diverse, high-score subset.
    ///
    /// Fails with [`AppError::NoQualifyingSources`] rather than returning an
    /// empty selection.
    pub fn select(&self, ranked: &[SearchResult]) -> Result<Vec<SearchResult>> {
        let mut ordered: Vec<&SearchResult> = ranked.iter().collect();
        ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut hosts = HashSet::new();
        let mut selected = Vec::new();

        for result in ordered {
            if selected.len() >= self.max_sources {
                break;
            }
            if result.score <= self.min_score {
                continue;
            }
            if !hosts.insert(host_key(&result.url)) {
                tracing::debug!(url = %result.url, "Skipping source from an already selected host");
                continue;
            }
            selected.push(result.clone());
        }

        if selected.is_empty() {
            return Err(AppError::NoQualifyingSources);
        }

        tracing::info!(
            candidates = ranked.len(),
            selected = selected.len(),
            "Selected diverse sources"
        );
        Ok(selected)
    }
}

/// Hostname used for diversity; URLs without one (documents, malformed
/// input) are keyed by the full URL so each stands alone.
pub fn host_key(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
