//! Report Synthesizer
//!
//! Turns fetched sources plus a research brief into a structured report.
//! The model only produces `{title, summary, sections}`; source bookkeeping
//! is attached afterwards by the caller via [`ReportDraft::into_report`].

use crate::llm::LLMClient;
use crate::research::decode::decode_structured;
use crate::research::fetcher::FetchedSource;
use crate::research::ranker::{is_test_report, is_test_url};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{AppError, Report, ReportSection, ReportSource, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str = "You are a research analyst who writes clear, well-structured \
reports grounded only in the provided sources. Respond with JSON only.";

pub const CONSOLIDATION_SYSTEM_PROMPT: &str = "You are a research editor who merges several \
independent research reports into one coherent report. Respond with JSON only.";

/// Report body as returned by the Model Service, before sources are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub title: String,
    pub summary: String,
    pub sections: Vec<ReportSection>,
}

impl ReportDraft {
    pub fn into_report(self, sources: Vec<ReportSource>) -> Report {
        Report {
            title: self.title,
            summary: self.summary,
            sections: self.sections,
            sources,
        }
    }
}

impl From<&Report> for ReportDraft {
    fn from(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            summary: report.summary.clone(),
            sections: report.sections.clone(),
        }
    }
}

pub struct ReportSynthesizer {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl ReportSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Synthesize a report from `sources` following the brief in `prompt`
    pub async fn synthesize(&self, prompt: &str, sources: &[FetchedSource]) -> Result<ReportDraft> {
        if sources.is_empty() {
            return Err(AppError::Precondition(
                "report synthesis needs at least one source".to_string(),
            ));
        }

        if sources.iter().all(|s| is_test_url(&s.result.url)) {
            tracing::debug!("Test sources, returning canned report");
            return Ok(canned_draft(sources));
        }

        let request = build_prompt(prompt, sources);
        let draft = self.request(SYSTEM_PROMPT, &request).await?;
        tracing::info!(title = %draft.title, sections = draft.sections.len(), "Synthesized report");
        Ok(draft)
    }

    /// Merge several reports into one, drawing out common themes, contrasts
    /// and an overarching conclusion
    pub async fn consolidate(&self, reports: &[Report]) -> Result<ReportDraft> {
        if reports.iter().all(is_test_report) {
            tracing::debug!("Test reports, returning canned consolidation");
            return Ok(canned_consolidation(reports));
        }

        let request = build_consolidation_prompt(reports);
        let draft = self.request(CONSOLIDATION_SYSTEM_PROMPT, &request).await?;
        tracing::info!(
            title = %draft.title,
            contributors = reports.len(),
            "Consolidated reports"
        );
        Ok(draft)
    }

    async fn request(&self, system: &str, prompt: &str) -> Result<ReportDraft> {
        let raw = with_retry(&self.retry, || self.llm.generate_with_system(system, prompt)).await?;
        let draft: ReportDraft = decode_structured(&raw)?;
        if draft.title.trim().is_empty() {
            return Err(AppError::MalformedResponse("report has no title".to_string()));
        }
        Ok(draft)
    }
}

fn canned_draft(sources: &[FetchedSource]) -> ReportDraft {
    ReportDraft {
        title: "Test Report".to_string(),
        summary: "Canned report built from the test sources.".to_string(),
        sections: sources
            .iter()
            .map(|s| ReportSection {
                title: s.result.title.clone(),
                content: s.content.clone(),
            })
            .collect(),
    }
}

fn canned_consolidation(reports: &[Report]) -> ReportDraft {
    ReportDraft {
        title: "Consolidated Test Report".to_string(),
        summary: format!("Canned consolidation of {} test reports.", reports.len()),
        sections: reports
            .iter()
            .map(|r| ReportSection {
                title: r.title.clone(),
                content: r.summary.clone(),
            })
            .collect(),
    }
}

const RESPONSE_SHAPE: &str = r#"Return a JSON object:
{
  "title": "<report title>",
  "summary": "<two or three sentence summary>",
  "sections": [{"title": "<section title>", "content": "<markdown body>"}]
}"#;

fn build_prompt(prompt: &str, sources: &[FetchedSource]) -> String {
    let listing = sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[{}] {}\nURL: {}\n{}",
                i + 1,
                s.result.title,
                s.result.url,
                s.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!("Research brief: {prompt}\n\nSources:\n{listing}\n\n{RESPONSE_SHAPE}")
}

fn build_consolidation_prompt(reports: &[Report]) -> String {
    let listing = reports
        .iter()
        .enumerate()
        .map(|(i, report)| {
            let sections = report
                .sections
                .iter()
                .map(|s| format!("### {}\n{}", s.title, s.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!(
                "## Report {}: {}\nSummary: {}\n\n{}",
                i + 1,
                report.title,
                report.summary,
                sections
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Combine the following {} reports into a single consolidated report. \
Identify the themes they share, point out where they differ or contradict each \
other, and finish with an overarching conclusion.\n\n{listing}\n\n{RESPONSE_SHAPE}",
        reports.len()
    )
}
