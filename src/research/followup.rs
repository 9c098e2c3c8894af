//! Follow-up Generator
//!
//! Proposes the next search terms for a report. A structured answer with
//! enough terms is preferred; otherwise up to [`FOLLOW_UP_COUNT`] non-empty
//! lines are salvaged from the raw reply so the round can still progress.

use crate::llm::LLMClient;
use crate::research::decode::decode_structured;
use crate::research::ranker::is_test_report;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{AppError, Report, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

pub const SYSTEM_PROMPT: &str = "You suggest follow-up web searches that would deepen a \
research report. Respond with JSON only.";

pub const FOLLOW_UP_COUNT: usize = 3;

/// Leading bullets, quote markers and `1.` / `2)` / `3:` numbering
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•>]\s*)*(?:\d+[.):]\s*)?").expect("valid list marker regex")
});

#[derive(Deserialize)]
#[serde(untagged)]
enum FollowUpReply {
    Object {
        #[serde(rename = "searchTerms", alias = "search_terms")]
        search_terms: Vec<String>,
    },
    List(Vec<String>),
}

impl FollowUpReply {
    fn into_terms(self) -> Vec<String> {
        match self {
            Self::Object { search_terms } => search_terms,
            Self::List(terms) => terms,
        }
    }
}

pub struct FollowUpGenerator {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl FollowUpGenerator {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn generate(&self, report: &Report) -> Result<Vec<String>> {
        if is_test_report(report) {
            tracing::debug!("Test report, returning canned follow-up terms");
            return Ok(canned_terms());
        }

        let prompt = build_prompt(report);
        let raw = with_retry(&self.retry, || self.llm.generate_with_system(SYSTEM_PROMPT, &prompt))
            .await?;

        let structured = decode_structured::<FollowUpReply>(&raw)
            .map(|reply| clean_terms(reply.into_terms()))
            .unwrap_or_default();
        if structured.len() >= FOLLOW_UP_COUNT {
            return Ok(structured.into_iter().take(FOLLOW_UP_COUNT).collect());
        }

        tracing::warn!(
            structured = structured.len(),
            "Follow-up reply not usable as structured data, falling back to lines"
        );
        let lines = extract_lines(&raw);
        if lines.is_empty() {
            return Err(AppError::MalformedResponse(
                "no follow-up search terms found".to_string(),
            ));
        }
        Ok(lines)
    }
}

/// Terms used for the canned test round; each still routes to canned search
pub fn canned_terms() -> Vec<String> {
    vec![
        "test".to_string(),
        "Test".to_string(),
        "TEST".to_string(),
    ]
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_string();
        if !term.is_empty() && !cleaned.contains(&term) {
            cleaned.push(term);
        }
    }
    cleaned
}

/// Up to [`FOLLOW_UP_COUNT`] non-empty lines with list markers, numbering and
/// quoting removed. Lines that are only JSON punctuation or key openers are
/// skipped.
pub fn extract_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            LIST_MARKER
                .replace(line.trim(), "")
                .trim()
                .trim_end_matches(',')
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("```"))
        .filter(|line| !line.chars().all(|c| "{}[],:".contains(c)))
        .filter(|line| !line.ends_with('[') && !line.ends_with('{'))
        .take(FOLLOW_UP_COUNT)
        .collect()
}

fn build_prompt(report: &Report) -> String {
    let sections = report
        .sections
        .iter()
        .map(|s| format!("- {}", s.title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Report title: {}
Summary: {}
Sections:
{}

Suggest exactly {} follow-up web search queries that explore gaps or promising
directions in this report. Return a JSON object:
{{"searchTerms": ["<query>", "<query>", "<query>"]}}"#,
        report.title, report.summary, sections, FOLLOW_UP_COUNT
    )
}
