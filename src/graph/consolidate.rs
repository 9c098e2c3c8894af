//! Consolidation Engine
//!
//! Merges two or more Ready reports into one. Contributor validation
//! happens against a graph snapshot before any model call; the merged
//! report cites each contributing report node as one source.

use crate::graph::node::{NodeId, NodeKind};
use crate::graph::state::GraphState;
use crate::research::ReportSynthesizer;
use crate::types::{AppError, Report, ReportSource, Result};
use std::collections::HashSet;

/// Minimum number of valid reports a consolidation needs
pub const MIN_CONTRIBUTORS: usize = 2;

/// A report taking part in a consolidation
#[derive(Debug, Clone, PartialEq)]
pub struct Contributor {
    pub id: NodeId,
    pub report: Report,
}

pub struct ConsolidationEngine<'a> {
    synthesizer: &'a ReportSynthesizer,
}

impl<'a> ConsolidationEngine<'a> {
    pub fn new(synthesizer: &'a ReportSynthesizer) -> Self {
        Self { synthesizer }
    }

    /// Resolve `ids` to distinct Ready report nodes.
    ///
    /// Ids that are unknown, not reports, or not Ready are skipped with a
    /// warning; fewer than [`MIN_CONTRIBUTORS`] survivors is a failed
    /// precondition.
    pub fn contributors(state: &GraphState, ids: &[NodeId]) -> Result<Vec<Contributor>> {
        let mut seen = HashSet::new();
        let mut contributors = Vec::new();

        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let report = state
                .require(id, NodeKind::Report)
                .ok()
                .and_then(|node| node.ready_report());
            match report {
                Some(report) => contributors.push(Contributor {
                    id: id.clone(),
                    report: report.clone(),
                }),
                None => tracing::warn!(id = %id, "Skipping node that is not a ready report"),
            }
        }

        if contributors.len() < MIN_CONTRIBUTORS {
            return Err(AppError::Precondition(format!(
                "consolidation needs at least {} ready reports, got {}",
                MIN_CONTRIBUTORS,
                contributors.len()
            )));
        }
        Ok(contributors)
    }

    /// Synthesize the consolidated report with one source per contributor
    pub async fn consolidate(&self, contributors: &[Contributor]) -> Result<Report> {
        if contributors.len() < MIN_CONTRIBUTORS {
            return Err(AppError::Precondition(format!(
                "consolidation needs at least {} ready reports, got {}",
                MIN_CONTRIBUTORS,
                contributors.len()
            )));
        }

        let reports: Vec<Report> = contributors.iter().map(|c| c.report.clone()).collect();
        let draft = self.synthesizer.consolidate(&reports).await?;
        Ok(draft.into_report(consolidated_sources(contributors)))
    }
}

/// Sources of a consolidated report: the contributing report nodes
pub fn consolidated_sources(contributors: &[Contributor]) -> Vec<ReportSource> {
    contributors
        .iter()
        .map(|c| ReportSource {
            id: c.id.clone(),
            url: format!("node:{}", c.id),
            name: c.report.title.clone(),
        })
        .collect()
}

/// Label for the group holding a consolidated report
pub fn group_label(contributors: &[Contributor]) -> String {
    let titles: Vec<&str> = contributors.iter().map(|c| c.report.title.as_str()).collect();
    format!("Consolidated: {}", titles.join(" + "))
}
