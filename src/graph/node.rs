use crate::types::{OptimizedQuery, Report, SearchProviderKind, SearchResult, SourceStatus, TimeFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, stable node identifier
pub type NodeId = String;

/// Allocate a fresh id; unique across concurrent callers and never reused
pub fn new_node_id(kind: NodeKind) -> NodeId {
    format!("{}-{}", kind, Uuid::new_v4())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Search,
    Selection,
    Report,
    FollowUp,
    Group,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Search => "search",
            Self::Selection => "selection",
            Self::Report => "report",
            Self::FollowUp => "followup",
            Self::Group => "group",
        };
        f.write_str(name)
    }
}

/// Node lifecycle: `Pending -> Loading -> Ready | Failed`, never backward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Loading,
    Ready,
    Failed,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Whether `self -> next` is a legal forward transition
    pub fn can_advance_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Loading)
                | (Self::Loading, Self::Ready)
                | (Self::Loading, Self::Failed)
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    pub query: String,
    #[serde(default)]
    pub time_filter: TimeFilter,
    #[serde(default)]
    pub provider: SearchProviderKind,
    /// Round runs against canned data only
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<OptimizedQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    pub results: Vec<SearchResult>,
    pub prompt_draft: String,
    /// Ranker's overall assessment from the latest automatic report
    #[serde(default)]
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Present once the node is Ready
    #[serde(default)]
    pub report: Option<Report>,
    #[serde(default)]
    pub is_consolidated: bool,
    /// Result ids picked by hand; `None` for automatic selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked: Option<Vec<String>>,
    /// How each source's content was obtained, keyed by URL
    #[serde(default)]
    pub source_status: BTreeMap<String, SourceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpPayload {
    #[serde(default)]
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPayload {
    pub label: String,
}

/// Kind-specific node data; the variant determines the node's kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodePayload {
    Search(SearchPayload),
    Selection(SelectionPayload),
    Report(ReportPayload),
    FollowUp(FollowUpPayload),
    Group(GroupPayload),
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Search(_) => NodeKind::Search,
            Self::Selection(_) => NodeKind::Selection,
            Self::Report(_) => NodeKind::Report,
            Self::FollowUp(_) => NodeKind::FollowUp,
            Self::Group(_) => NodeKind::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchNode {
    pub id: NodeId,
    /// Tree parent; `None` for roots
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub child_ids: Vec<NodeId>,
    pub payload: NodePayload,
    pub status: NodeStatus,
    /// Set iff `status` is Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResearchNode {
    /// A new node with a freshly allocated id
    pub fn new(parent_id: Option<NodeId>, payload: NodePayload, status: NodeStatus) -> Self {
        Self {
            id: new_node_id(payload.kind()),
            parent_id,
            child_ids: Vec::new(),
            payload,
            status,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn is_ready(&self) -> bool {
        self.status == NodeStatus::Ready
    }

    /// The report, for Ready report nodes
    pub fn ready_report(&self) -> Option<&Report> {
        match (&self.payload, self.status) {
            (NodePayload::Report(payload), NodeStatus::Ready) => payload.report.as_ref(),
            _ => None,
        }
    }

    /// Short human label used in listings
    pub fn label(&self) -> String {
        match &self.payload {
            NodePayload::Search(p) => p.query.clone(),
            NodePayload::Selection(p) => format!("{} results", p.results.len()),
            NodePayload::Report(p) => p
                .report
                .as_ref()
                .map(|r| r.title.clone())
                .unwrap_or_else(|| "(report)".to_string()),
            NodePayload::FollowUp(p) => p.search_terms.join(" | "),
            NodePayload::Group(p) => p.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Mirrors a parent/child link
    Tree,
    /// Contributor report to consolidated report
    Consolidation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}
