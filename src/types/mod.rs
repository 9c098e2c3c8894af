use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= Search Types =============

/// A single web (or user-supplied) source in a research round.
///
/// `url` is the deduplication key within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    /// Relevance in `[0, 1]`; zero until ranked.
    #[serde(default)]
    pub score: f32,
    /// Full text, when already known (uploaded documents, canned results).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub is_custom_url: bool,
}

impl SearchResult {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            score: 0.0,
            content: None,
            is_custom_url: false,
        }
    }
}

/// Recency restriction passed to the search provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeFilter {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "year")]
    Year,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl FromStr for TimeFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "24h" | "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" | "any" => Ok(Self::All),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown time filter: {}. Use one of: 24h, week, month, year, all",
                s
            ))),
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which Search Service answers a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    DuckDuckGo,
    Bing,
}

impl FromStr for SearchProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "bing" => Ok(Self::Bing),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown search provider: {}. Use one of: duckduckgo, bing",
                s
            ))),
        }
    }
}

impl fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuckDuckGo => f.write_str("duckduckgo"),
            Self::Bing => f.write_str("bing"),
        }
    }
}

// ============= Stage Outputs =============

/// Output of the query optimization stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedQuery {
    pub query: String,
    pub optimized_prompt: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggested_structure: Vec<String>,
}

/// Per-URL relevance judgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub url: String,
    pub score: f32,
    #[serde(default)]
    pub reasoning: String,
}

/// Output of the relevance ranking stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingOutcome {
    pub rankings: Vec<Ranking>,
    #[serde(default)]
    pub analysis: String,
}

impl RankingOutcome {
    /// Score for a URL, zero when the ranker could not score it
    pub fn score_for(&self, url: &str) -> f32 {
        self.rankings
            .iter()
            .find(|r| r.url == url)
            .map(|r| r.score)
            .unwrap_or(0.0)
    }
}

// ============= Report Types =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSource {
    pub id: String,
    pub url: String,
    pub name: String,
}

/// A synthesized research report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub summary: String,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub sources: Vec<ReportSource>,
}

/// How a source's content was obtained for synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Full text was retrieved (or supplied inline)
    Fetched,
    /// Retrieval failed; the search snippet stood in for the content
    Preview,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("no qualifying diverse sources")]
    NoQualifyingSources,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for the HTTP 429 class of failures, the only ones worth retrying
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            AppError::RateLimited(err.to_string())
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_filter_from_str() {
        assert_eq!("24h".parse::<TimeFilter>().unwrap(), TimeFilter::Day);
        assert_eq!("Week".parse::<TimeFilter>().unwrap(), TimeFilter::Week);
        assert_eq!("all".parse::<TimeFilter>().unwrap(), TimeFilter::All);
        assert!("decade".parse::<TimeFilter>().is_err());
    }

    #[test]
    fn test_time_filter_serde_names() {
        let json = serde_json::to_string(&TimeFilter::Day).unwrap();
        assert_eq!(json, "\"24h\"");
        let parsed: TimeFilter = serde_json::from_str("\"month\"").unwrap();
        assert_eq!(parsed, TimeFilter::Month);
    }

    #[test]
    fn test_search_result_camel_case() {
        let mut result = SearchResult::new("r1", "https://a.com", "A", "snippet");
        result.is_custom_url = true;
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isCustomUrl"], true);
        assert!(value.get("content").is_none());
    }

    #[test]
    fn test_ranking_outcome_unscored_is_zero() {
        let outcome = RankingOutcome {
            rankings: vec![Ranking {
                url: "https://a.com".to_string(),
                score: 0.7,
                reasoning: String::new(),
            }],
            analysis: String::new(),
        };
        assert_eq!(outcome.score_for("https://a.com"), 0.7);
        assert_eq!(outcome.score_for("https://b.com"), 0.0);
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(AppError::RateLimited("429".into()).is_rate_limited());
        assert!(!AppError::Upstream("503".into()).is_rate_limited());
        assert!(!AppError::NoQualifyingSources.is_rate_limited());
    }
}
