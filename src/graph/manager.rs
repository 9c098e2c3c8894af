//! Research Graph Manager
//!
//! Drives research rounds through the pipeline stages and records every
//! step in the graph. All graph mutation goes through
//! [`ResearchGraphManager::dispatch`]; the lock is never held across an
//! await, so rounds on different branches (and consolidations) can run
//! concurrently. Every successful dispatch publishes the new state on a
//! watch channel for persistence.

use crate::graph::consolidate::{group_label, ConsolidationEngine};
use crate::graph::node::{
    FollowUpPayload, GroupPayload, NodeId, NodeKind, NodePayload, NodeStatus, ReportPayload,
    ResearchNode, SearchPayload, SelectionPayload,
};
use crate::graph::state::{GraphState, Intent};
use crate::research::fetcher::fetch_sources;
use crate::research::optimizer;
use crate::research::ResearchServices;
use crate::types::{
    AppError, OptimizedQuery, Report, ReportSource, Result, SearchProviderKind, SearchResult,
    SourceStatus, TimeFilter,
};
use crate::utils::toml_config::PipelineConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Characters of an uploaded document used as its snippet
const DOCUMENT_SNIPPET_CHARS: usize = 200;

/// Per-round search settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundOptions {
    pub time_filter: TimeFilter,
    pub provider: SearchProviderKind,
    /// Use canned optimizer/search/rank data only
    pub test_mode: bool,
}

impl RoundOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            time_filter: config.time_filter,
            provider: config.search_provider,
            test_mode: false,
        }
    }
}

/// How the sources of a report are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportMode {
    /// Rank, then pick a diverse subset
    Automatic,
    /// Use exactly these result ids, in this order
    Manual(Vec<String>),
}

/// Where a branch takes its query from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTarget {
    /// Index into the report's follow-up terms
    Term(usize),
    Query(String),
}

/// Nodes created by [`ResearchGraphManager::start_round`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundHandle {
    pub group: NodeId,
    pub search: NodeId,
    pub selection: NodeId,
}

/// Nodes created by [`ResearchGraphManager::generate_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandle {
    pub report: NodeId,
    pub follow_up: NodeId,
}

pub struct ResearchGraphManager {
    state: Mutex<GraphState>,
    services: Arc<ResearchServices>,
    updates: watch::Sender<GraphState>,
}

impl ResearchGraphManager {
    pub fn new(services: Arc<ResearchServices>) -> Self {
        Self::with_state(services, GraphState::new())
    }

    /// Resume from a previously persisted state
    pub fn with_state(services: Arc<ResearchServices>, state: GraphState) -> Self {
        let (updates, _) = watch::channel(state.clone());
        Self {
            state: Mutex::new(state),
            services,
            updates,
        }
    }

    /// Receive a full snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<GraphState> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> GraphState {
        self.state.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Apply an intent and publish the resulting state
    pub fn dispatch(&self, intent: Intent) -> Result<()> {
        let mut state = self.state.lock();
        state.apply(intent)?;
        // Publish under the lock so snapshots arrive in apply order.
        self.updates.send_replace(state.clone());
        Ok(())
    }

    fn create(&self, parent: Option<NodeId>, payload: NodePayload, status: NodeStatus) -> Result<NodeId> {
        let node = ResearchNode::new(parent, payload, status);
        let id = node.id.clone();
        self.dispatch(Intent::CreateNode(node))?;
        Ok(id)
    }

    fn fail(&self, id: &str, error: &AppError) {
        tracing::warn!(id, "Stage failed: {}", error);
        if let Err(e) = self.dispatch(Intent::FailStage {
            id: id.to_string(),
            error: error.to_string(),
        }) {
            tracing::error!(id, "Could not record stage failure: {}", e);
        }
    }

    // ============= Rounds =============

    /// Create a Group/Search pair (optionally under a report), optimize and
    /// search, then seed a Selection node with the results.
    pub async fn start_round(
        &self,
        topic: &str,
        parent: Option<&str>,
        options: RoundOptions,
    ) -> Result<RoundHandle> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::InvalidInput("Research topic is empty".to_string()));
        }
        if let Some(parent) = parent {
            self.read(|s| s.require(parent, NodeKind::Report).map(|_| ()))?;
        }

        self.dispatch(Intent::SetTopic(topic.to_string()))?;
        let group = self.create(
            parent.map(str::to_string),
            NodePayload::Group(GroupPayload {
                label: topic.to_string(),
            }),
            NodeStatus::Ready,
        )?;
        let search = self.create(
            Some(group.clone()),
            NodePayload::Search(SearchPayload {
                query: topic.to_string(),
                time_filter: options.time_filter,
                provider: options.provider,
                test_mode: options.test_mode,
                optimized: None,
            }),
            NodeStatus::Loading,
        )?;
        tracing::info!(%search, topic, "Research round started");

        let (optimized, results) = match self.optimize_and_search(topic, options).await {
            Ok(found) => found,
            Err(e) => {
                self.fail(&search, &e);
                return Err(e);
            }
        };

        self.dispatch(Intent::CompleteStage {
            id: search.clone(),
            payload: NodePayload::Search(SearchPayload {
                query: optimized.query.clone(),
                time_filter: options.time_filter,
                provider: options.provider,
                test_mode: options.test_mode,
                optimized: Some(optimized.clone()),
            }),
        })?;
        let selection = self.create(
            Some(search.clone()),
            NodePayload::Selection(SelectionPayload {
                results,
                prompt_draft: optimized.optimized_prompt,
                analysis: String::new(),
            }),
            NodeStatus::Ready,
        )?;
        tracing::info!(%search, %selection, "Search stage ready");

        Ok(RoundHandle {
            group,
            search,
            selection,
        })
    }

    async fn optimize_and_search(
        &self,
        topic: &str,
        options: RoundOptions,
    ) -> Result<(OptimizedQuery, Vec<SearchResult>)> {
        let optimized = if options.test_mode {
            optimizer::canned_response()
        } else {
            self.services.optimizer.optimize(topic).await?
        };
        let results = self
            .services
            .retriever
            .search(
                &optimized.query,
                options.time_filter,
                options.provider,
                options.test_mode,
            )
            .await?;
        Ok((optimized, dedup_by_url(results)))
    }

    /// Create a Report/FollowUp pair under a Ready selection and run
    /// ranking, selection, fetching, synthesis and follow-up generation.
    ///
    /// A synthesis failure marks both new nodes Failed and is returned; a
    /// follow-up failure only marks the FollowUp node.
    pub async fn generate_report(&self, selection: &str, mode: ReportMode) -> Result<ReportHandle> {
        let (results, prompt, test_mode) = self.read(|s| -> Result<_> {
            let node = s.require(selection, NodeKind::Selection)?;
            if !node.is_ready() {
                return Err(AppError::InvalidState(format!(
                    "Selection '{}' is not ready",
                    selection
                )));
            }
            let test_mode = match s.ancestor_of_kind(selection, NodeKind::Search).map(|n| &n.payload) {
                Some(NodePayload::Search(search)) => search.test_mode,
                _ => false,
            };
            match &node.payload {
                NodePayload::Selection(p) => Ok((p.results.clone(), p.prompt_draft.clone(), test_mode)),
                _ => Err(AppError::Internal("selection payload mismatch".to_string())),
            }
        })?;

        let picked = match &mode {
            ReportMode::Automatic => None,
            ReportMode::Manual(ids) => Some(pick_results(&results, ids)?),
        };

        let report = self.create(
            Some(selection.to_string()),
            NodePayload::Report(ReportPayload {
                picked: match &mode {
                    ReportMode::Manual(ids) => Some(ids.clone()),
                    ReportMode::Automatic => None,
                },
                ..Default::default()
            }),
            NodeStatus::Loading,
        )?;
        let follow_up = self.create(
            Some(report.clone()),
            NodePayload::FollowUp(FollowUpPayload::default()),
            NodeStatus::Loading,
        )?;
        tracing::info!(%report, selection, "Report generation started");

        let produced = self
            .produce_report(selection, results, &prompt, test_mode, picked)
            .await;
        let report_body = match produced {
            Ok((body, source_status)) => {
                self.dispatch(Intent::CompleteStage {
                    id: report.clone(),
                    payload: NodePayload::Report(ReportPayload {
                        report: Some(body.clone()),
                        is_consolidated: false,
                        picked: match mode {
                            ReportMode::Manual(ids) => Some(ids),
                            ReportMode::Automatic => None,
                        },
                        source_status,
                    }),
                })?;
                tracing::info!(%report, title = %body.title, "Report ready");
                body
            }
            Err(e) => {
                self.fail(&report, &e);
                self.fail(
                    &follow_up,
                    &AppError::Precondition("report generation failed".to_string()),
                );
                return Err(e);
            }
        };

        match self.services.followup.generate(&report_body).await {
            Ok(search_terms) => {
                self.dispatch(Intent::CompleteStage {
                    id: follow_up.clone(),
                    payload: NodePayload::FollowUp(FollowUpPayload { search_terms }),
                })?;
                tracing::info!(%follow_up, "Follow-up terms ready");
            }
            Err(e) => self.fail(&follow_up, &e),
        }

        Ok(ReportHandle { report, follow_up })
    }

    async fn produce_report(
        &self,
        selection: &str,
        results: Vec<SearchResult>,
        prompt: &str,
        test_mode: bool,
        picked: Option<Vec<SearchResult>>,
    ) -> Result<(Report, BTreeMap<String, SourceStatus>)> {
        let chosen = match picked {
            Some(picked) => picked,
            None => {
                let outcome = self.services.ranker.rank(prompt, &results, test_mode).await?;
                self.dispatch(Intent::RecordScores {
                    selection: selection.to_string(),
                    outcome: outcome.clone(),
                })?;

                // Ranker order first so ties keep it; unscored results trail.
                let position = |url: &str| {
                    outcome
                        .rankings
                        .iter()
                        .position(|r| r.url == url)
                        .unwrap_or(usize::MAX)
                };
                let mut ranked: Vec<SearchResult> = results
                    .into_iter()
                    .map(|mut r| {
                        r.score = outcome.score_for(&r.url);
                        r
                    })
                    .collect();
                ranked.sort_by_key(|r| position(&r.url));
                self.services.selector.select(&ranked)?
            }
        };

        let fetched = fetch_sources(self.services.fetcher.as_ref(), &self.services.retry, &chosen).await;
        let previews = fetched
            .iter()
            .filter(|f| f.status == SourceStatus::Preview)
            .count();
        tracing::info!(sources = fetched.len(), previews, "Fetched source content");

        let draft = self.services.synthesizer.synthesize(prompt, &fetched).await?;

        let sources = fetched
            .iter()
            .map(|f| ReportSource {
                id: f.result.id.clone(),
                url: f.result.url.clone(),
                name: f.result.title.clone(),
            })
            .collect();
        let source_status = fetched
            .iter()
            .map(|f| (f.result.url.clone(), f.status))
            .collect();
        Ok((draft.into_report(sources), source_status))
    }

    /// A full round: search, then an automatic report
    pub async fn run_round(
        &self,
        topic: &str,
        parent: Option<&str>,
        options: RoundOptions,
    ) -> Result<(RoundHandle, ReportHandle)> {
        let round = self.start_round(topic, parent, options).await?;
        let report = self.generate_report(&round.selection, ReportMode::Automatic).await?;
        Ok((round, report))
    }

    /// Start a new round under `report`, from one of its follow-up terms or
    /// an explicit query. Test mode carries over from the report's round.
    pub async fn branch_from_report(
        &self,
        report: &str,
        target: BranchTarget,
        options: RoundOptions,
    ) -> Result<RoundHandle> {
        let (query, inherited_test) = self.read(|s| -> Result<_> {
            s.require(report, NodeKind::Report)?;
            let inherited = match s.ancestor_of_kind(report, NodeKind::Search).map(|n| &n.payload) {
                Some(NodePayload::Search(search)) => search.test_mode,
                _ => false,
            };
            let query = match &target {
                BranchTarget::Query(query) => query.clone(),
                BranchTarget::Term(index) => {
                    let follow_up = s.follow_up_of(report).filter(|n| n.is_ready()).ok_or_else(|| {
                        AppError::InvalidState(format!("Report '{}' has no ready follow-up terms", report))
                    })?;
                    match &follow_up.payload {
                        NodePayload::FollowUp(p) => p.search_terms.get(*index).cloned().ok_or_else(|| {
                            AppError::InvalidInput(format!(
                                "Follow-up term {} does not exist ({} available)",
                                index,
                                p.search_terms.len()
                            ))
                        })?,
                        _ => return Err(AppError::Internal("follow-up payload mismatch".to_string())),
                    }
                }
            };
            Ok((query, inherited))
        })?;

        let options = RoundOptions {
            test_mode: options.test_mode || inherited_test,
            ..options
        };
        tracing::info!(report, query = %query, "Branching from report");
        self.start_round(&query, Some(report), options).await
    }

    /// Re-run a Failed report: a fresh Report/FollowUp pair under the same
    /// selection, or a fresh consolidation over the same contributors.
    pub async fn retry_report(&self, report: &str) -> Result<NodeId> {
        enum Retry {
            Round(NodeId, ReportMode),
            Consolidation(Vec<NodeId>),
        }

        let retry = self.read(|s| -> Result<Retry> {
            let node = s.require(report, NodeKind::Report)?;
            if node.status != NodeStatus::Failed {
                return Err(AppError::InvalidState(format!(
                    "Only failed reports can be retried; '{}' is {}",
                    report, node.status
                )));
            }
            match &node.payload {
                NodePayload::Report(p) if p.is_consolidated => {
                    Ok(Retry::Consolidation(s.contributors_of(report)))
                }
                NodePayload::Report(p) => {
                    let selection = node.parent_id.clone().ok_or_else(|| {
                        AppError::Internal(format!("Report '{}' has no selection", report))
                    })?;
                    let mode = p
                        .picked
                        .clone()
                        .map(ReportMode::Manual)
                        .unwrap_or(ReportMode::Automatic);
                    Ok(Retry::Round(selection, mode))
                }
                _ => Err(AppError::Internal("report payload mismatch".to_string())),
            }
        })?;

        match retry {
            Retry::Round(selection, mode) => Ok(self.generate_report(&selection, mode).await?.report),
            Retry::Consolidation(contributors) => self.consolidate(&contributors).await,
        }
    }

    // ============= User-supplied sources =============

    /// Add a user-supplied URL to a selection
    pub async fn add_custom_url(&self, selection: &str, url: &str) -> Result<SearchResult> {
        let url = url.trim();
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "Only http(s) URLs can be added, got '{}'",
                url
            )));
        }

        let mut result = SearchResult::new(
            format!("custom-{}", Uuid::new_v4()),
            url,
            parsed.host_str().unwrap_or(url),
            "",
        );
        result.is_custom_url = true;

        self.dispatch(Intent::AddResult {
            selection: selection.to_string(),
            result: result.clone(),
        })?;
        tracing::info!(selection, url, "Added custom URL");
        Ok(result)
    }

    /// Add an uploaded document; its content is used without fetching
    pub async fn add_document(&self, selection: &str, name: &str, content: &str) -> Result<SearchResult> {
        if content.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("Document '{}' is empty", name)));
        }

        let id = format!("doc-{}", Uuid::new_v4());
        let snippet: String = content.chars().take(DOCUMENT_SNIPPET_CHARS).collect();
        let mut result = SearchResult::new(id.clone(), format!("document://{}", id), name, snippet);
        result.content = Some(content.to_string());
        result.is_custom_url = true;

        self.dispatch(Intent::AddResult {
            selection: selection.to_string(),
            result: result.clone(),
        })?;
        tracing::info!(selection, name, "Added document");
        Ok(result)
    }

    // ============= Selection, deletion, consolidation =============

    /// Toggle a report in the consolidation selection; returns whether it is
    /// now selected
    pub fn toggle_report_selection(&self, report: &str) -> Result<bool> {
        self.dispatch(Intent::ToggleReportSelection {
            id: report.to_string(),
        })?;
        Ok(self.read(|s| s.selected_reports().iter().any(|id| id == report)))
    }

    pub fn delete_node(&self, id: &str) -> Result<()> {
        self.dispatch(Intent::DeleteNode { id: id.to_string() })
    }

    /// Merge two or more Ready reports into a new consolidated report node
    /// under its own root group
    pub async fn consolidate(&self, reports: &[NodeId]) -> Result<NodeId> {
        let contributors = self.read(|s| ConsolidationEngine::contributors(s, reports))?;

        let group = self.create(
            None,
            NodePayload::Group(GroupPayload {
                label: group_label(&contributors),
            }),
            NodeStatus::Ready,
        )?;
        let report = self.create(
            Some(group),
            NodePayload::Report(ReportPayload {
                is_consolidated: true,
                ..Default::default()
            }),
            NodeStatus::Loading,
        )?;
        for contributor in &contributors {
            self.dispatch(Intent::LinkNodes {
                from: contributor.id.clone(),
                to: report.clone(),
            })?;
        }
        tracing::info!(%report, contributors = contributors.len(), "Consolidation started");

        let engine = ConsolidationEngine::new(&self.services.synthesizer);
        match engine.consolidate(&contributors).await {
            Ok(body) => {
                self.dispatch(Intent::CompleteStage {
                    id: report.clone(),
                    payload: NodePayload::Report(ReportPayload {
                        report: Some(body),
                        is_consolidated: true,
                        ..Default::default()
                    }),
                })?;
                tracing::info!(%report, "Consolidated report ready");
                Ok(report)
            }
            Err(e) => {
                self.fail(&report, &e);
                Err(e)
            }
        }
    }

    /// Consolidate the reports currently selected for consolidation
    pub async fn consolidate_selected(&self) -> Result<NodeId> {
        let selected = self.read(|s| s.selected_reports().to_vec());
        self.consolidate(&selected).await
    }
}

/// First occurrence of each URL wins
fn dedup_by_url(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

/// Results named by id, in the order given
fn pick_results(results: &[SearchResult], ids: &[String]) -> Result<Vec<SearchResult>> {
    if ids.is_empty() {
        return Err(AppError::Precondition(
            "manual report generation needs at least one picked result".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .map(|id| {
            results
                .iter()
                .find(|r| &r.id == id)
                .cloned()
                .ok_or_else(|| AppError::InvalidInput(format!("Result '{}' is not in this selection", id)))
        })
        .collect()
}
