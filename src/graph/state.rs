//! Typed graph state and its reducer
//!
//! [`GraphState`] is an arena: nodes live in an id-indexed map, tree links
//! are child-id lists plus mirrored [`EdgeKind::Tree`] edges, and the rare
//! multi-parent link (consolidation) is a separate [`EdgeKind::Consolidation`]
//! edge record. The state only changes through [`GraphState::apply`]; every
//! intent is validated before anything is mutated, so a rejected intent
//! leaves the state untouched.

use crate::graph::node::{
    Edge, EdgeKind, NodeId, NodeKind, NodePayload, NodeStatus, ResearchNode, SelectionPayload,
};
use crate::types::{AppError, RankingOutcome, Result, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A requested change to the graph
#[derive(Debug, Clone)]
pub enum Intent {
    /// Insert a node and link it under its parent
    CreateNode(ResearchNode),
    /// `Pending -> Loading`
    AdvanceStage { id: NodeId },
    /// `Loading -> Ready`, replacing the payload (same kind)
    CompleteStage { id: NodeId, payload: NodePayload },
    /// `Loading -> Failed`
    FailStage { id: NodeId, error: String },
    /// Append a result to a selection, unless its URL is already present
    AddResult { selection: NodeId, result: SearchResult },
    /// Write ranker scores (and analysis) back into a selection
    RecordScores { selection: NodeId, outcome: RankingOutcome },
    /// Consolidation edge from a contributing report to a consolidated one
    LinkNodes { from: NodeId, to: NodeId },
    ToggleReportSelection { id: NodeId },
    /// Remove a node with all of its tree descendants
    DeleteNode { id: NodeId },
    SetTopic(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphState {
    #[serde(default)]
    nodes: BTreeMap<NodeId, ResearchNode>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    topic: String,
    /// Reports chosen for consolidation, in selection order
    #[serde(default)]
    selected_reports: Vec<NodeId>,
    /// Ids of deleted nodes; never handed out again
    #[serde(default)]
    retired_ids: BTreeSet<NodeId>,
}

/// Which parents a node of each kind may hang under
fn parent_allowed(kind: NodeKind, parent: Option<NodeKind>) -> bool {
    matches!(
        (kind, parent),
        (NodeKind::Group, None)
            | (NodeKind::Group, Some(NodeKind::Report))
            | (NodeKind::Search, Some(NodeKind::Group))
            | (NodeKind::Selection, Some(NodeKind::Search))
            | (NodeKind::Report, Some(NodeKind::Selection))
            | (NodeKind::Report, Some(NodeKind::Group))
            | (NodeKind::FollowUp, Some(NodeKind::Report))
    )
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    // ============= Queries =============

    pub fn node(&self, id: &str) -> Option<&ResearchNode> {
        self.nodes.get(id)
    }

    /// The node, failing unless it exists and has the given kind
    pub fn require(&self, id: &str, kind: NodeKind) -> Result<&ResearchNode> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' does not exist", id)))?;
        if node.kind() != kind {
            return Err(AppError::InvalidInput(format!(
                "Node '{}' is a {} node, expected {}",
                id,
                node.kind(),
                kind
            )));
        }
        Ok(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResearchNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn selected_reports(&self) -> &[NodeId] {
        &self.selected_reports
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired_ids.contains(id)
    }

    /// Root nodes in creation order
    pub fn roots(&self) -> Vec<&ResearchNode> {
        let mut roots: Vec<&ResearchNode> =
            self.nodes.values().filter(|n| n.parent_id.is_none()).collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        roots
    }

    pub fn children(&self, id: &str) -> Vec<&ResearchNode> {
        self.nodes
            .get(id)
            .map(|n| n.child_ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Closest ancestor (or the node itself) of the given kind
    pub fn ancestor_of_kind(&self, id: &str, kind: NodeKind) -> Option<&ResearchNode> {
        let mut current = self.nodes.get(id);
        while let Some(node) = current {
            if node.kind() == kind {
                return Some(node);
            }
            current = node.parent_id.as_deref().and_then(|p| self.nodes.get(p));
        }
        None
    }

    /// Nodes belonging to a group: its descendants, stopping at nested groups
    pub fn group_members(&self, group: &str) -> Vec<NodeId> {
        let mut members = Vec::new();
        let mut stack: Vec<&str> = self
            .nodes
            .get(group)
            .map(|g| g.child_ids.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if node.kind() == NodeKind::Group {
                continue;
            }
            members.push(node.id.clone());
            stack.extend(node.child_ids.iter().map(String::as_str));
        }
        members
    }

    /// The follow-up node generated for a report
    pub fn follow_up_of(&self, report: &str) -> Option<&ResearchNode> {
        self.children(report)
            .into_iter()
            .find(|n| n.kind() == NodeKind::FollowUp)
    }

    /// Reports linked into a consolidated report
    pub fn contributors_of(&self, id: &str) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Consolidation && e.to == id)
            .map(|e| e.from.clone())
            .collect()
    }

    /// The node plus every tree descendant, depth first
    fn subtree(&self, id: &str) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.child_ids.iter().rev().cloned());
                ids.push(current);
            }
        }
        ids
    }

    /// Structural check for graphs that did not come through the reducer,
    /// such as imported projects. Tree links must be mirrored both ways and
    /// follow the kind rules, and every edge and selected report must name
    /// an existing node.
    pub fn check_consistency(&self) -> Result<()> {
        let broken = |msg: String| -> Result<()> { Err(AppError::InvalidState(msg)) };

        for (key, node) in &self.nodes {
            if key != &node.id {
                return broken(format!("Node stored under '{}' has id '{}'", key, node.id));
            }
            let parent = match &node.parent_id {
                Some(parent_id) => match self.nodes.get(parent_id) {
                    Some(parent) if parent.child_ids.contains(&node.id) => Some(parent),
                    Some(_) => {
                        return broken(format!(
                            "Parent '{}' does not list '{}' as a child",
                            parent_id, node.id
                        ))
                    }
                    None => return broken(format!("Parent '{}' does not exist", parent_id)),
                },
                None => None,
            };
            if !parent_allowed(node.kind(), parent.map(|p| p.kind())) {
                return broken(format!("Node '{}' has a parent of the wrong kind", node.id));
            }
            for child_id in &node.child_ids {
                match self.nodes.get(child_id) {
                    Some(child) if child.parent_id.as_deref() == Some(node.id.as_str()) => {}
                    _ => {
                        return broken(format!(
                            "Child '{}' of '{}' does not point back to it",
                            child_id, node.id
                        ))
                    }
                }
            }
        }

        if let Some(edge) = self
            .edges
            .iter()
            .find(|e| !self.nodes.contains_key(&e.from) || !self.nodes.contains_key(&e.to))
        {
            return broken(format!("Edge {} -> {} names a missing node", edge.from, edge.to));
        }
        if let Some(id) = self
            .selected_reports
            .iter()
            .find(|id| self.nodes.get(*id).map(|n| n.kind()) != Some(NodeKind::Report))
        {
            return broken(format!("Selected report '{}' does not exist", id));
        }
        Ok(())
    }

    // ============= Reducer =============

    pub fn apply(&mut self, intent: Intent) -> Result<()> {
        match intent {
            Intent::CreateNode(node) => self.create_node(node),
            Intent::AdvanceStage { id } => self.transition(&id, NodeStatus::Loading, None, None),
            Intent::CompleteStage { id, payload } => {
                self.transition(&id, NodeStatus::Ready, Some(payload), None)
            }
            Intent::FailStage { id, error } => {
                self.transition(&id, NodeStatus::Failed, None, Some(error))
            }
            Intent::AddResult { selection, result } => self.add_result(&selection, result),
            Intent::RecordScores { selection, outcome } => self.record_scores(&selection, outcome),
            Intent::LinkNodes { from, to } => self.link(from, to),
            Intent::ToggleReportSelection { id } => self.toggle_selection(&id),
            Intent::DeleteNode { id } => self.delete(&id),
            Intent::SetTopic(topic) => {
                self.topic = topic;
                Ok(())
            }
        }
    }

    fn create_node(&mut self, node: ResearchNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) || self.retired_ids.contains(&node.id) {
            return Err(AppError::InvalidState(format!(
                "Node id '{}' is already in use",
                node.id
            )));
        }
        if node.status == NodeStatus::Failed || node.error.is_some() {
            return Err(AppError::InvalidState(
                "Nodes cannot be created in a failed state".to_string(),
            ));
        }
        if !node.child_ids.is_empty() {
            return Err(AppError::InvalidState(
                "New nodes cannot carry children".to_string(),
            ));
        }

        let parent_kind = match &node.parent_id {
            Some(parent) => Some(
                self.nodes
                    .get(parent)
                    .ok_or_else(|| AppError::NotFound(format!("Parent '{}' does not exist", parent)))?
                    .kind(),
            ),
            None => None,
        };
        if !parent_allowed(node.kind(), parent_kind) {
            return Err(AppError::InvalidState(format!(
                "A {} node cannot be placed under {}",
                node.kind(),
                parent_kind.map(|k| k.to_string()).unwrap_or_else(|| "the root".to_string())
            )));
        }

        if let Some(parent) = node.parent_id.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.child_ids.push(node.id.clone());
            self.edges.push(Edge {
                from: parent.id.clone(),
                to: node.id.clone(),
                kind: EdgeKind::Tree,
            });
        }
        tracing::debug!(id = %node.id, kind = %node.kind(), status = %node.status, "Created node");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn transition(
        &mut self,
        id: &str,
        next: NodeStatus,
        payload: Option<NodePayload>,
        error: Option<String>,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' does not exist", id)))?;

        if !node.status.can_advance_to(next) {
            return Err(AppError::InvalidState(format!(
                "Node '{}' cannot move from {} to {}",
                id, node.status, next
            )));
        }
        if let Some(payload) = &payload {
            if payload.kind() != node.kind() {
                return Err(AppError::InvalidState(format!(
                    "Cannot store a {} payload on {} node '{}'",
                    payload.kind(),
                    node.kind(),
                    id
                )));
            }
        }

        if let Some(payload) = payload {
            node.payload = payload;
        }
        node.status = next;
        node.error = error;
        Ok(())
    }

    fn selection_mut(&mut self, id: &str) -> Result<&mut SelectionPayload> {
        self.require(id, NodeKind::Selection)?;
        match self.nodes.get_mut(id).map(|n| &mut n.payload) {
            Some(NodePayload::Selection(payload)) => Ok(payload),
            _ => Err(AppError::Internal(format!("Selection '{}' vanished", id))),
        }
    }

    fn add_result(&mut self, selection: &str, result: SearchResult) -> Result<()> {
        let payload = self.selection_mut(selection)?;
        if payload.results.iter().any(|r| r.url == result.url) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is already part of this selection",
                result.url
            )));
        }
        payload.results.push(result);
        Ok(())
    }

    fn record_scores(&mut self, selection: &str, outcome: RankingOutcome) -> Result<()> {
        let payload = self.selection_mut(selection)?;
        for result in &mut payload.results {
            result.score = outcome.score_for(&result.url);
        }
        payload.analysis = outcome.analysis;
        Ok(())
    }

    fn link(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.require(&from, NodeKind::Report)?;
        self.require(&to, NodeKind::Report)?;
        if from == to {
            return Err(AppError::InvalidInput("A report cannot consolidate itself".to_string()));
        }
        let edge = Edge {
            from,
            to,
            kind: EdgeKind::Consolidation,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    fn toggle_selection(&mut self, id: &str) -> Result<()> {
        let ready = self.require(id, NodeKind::Report)?.ready_report().is_some();
        if let Some(pos) = self.selected_reports.iter().position(|s| s == id) {
            self.selected_reports.remove(pos);
            return Ok(());
        }
        if !ready {
            return Err(AppError::InvalidState(format!(
                "Report '{}' is not ready and cannot be selected",
                id
            )));
        }
        self.selected_reports.push(id.to_string());
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' does not exist", id)))?;
        let parent = node.parent_id.clone();
        let removed: BTreeSet<NodeId> = self.subtree(id).into_iter().collect();

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.child_ids.retain(|c| c != id);
        }
        self.nodes.retain(|node_id, _| !removed.contains(node_id));
        self.edges
            .retain(|e| !removed.contains(&e.from) && !removed.contains(&e.to));
        self.selected_reports.retain(|s| !removed.contains(s));

        tracing::info!(id, removed = removed.len(), "Deleted node subtree");
        self.retired_ids.extend(removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{
        FollowUpPayload, GroupPayload, ReportPayload, SearchPayload, SelectionPayload,
    };
    use crate::types::{Ranking, Report};

    fn group() -> NodePayload {
        NodePayload::Group(GroupPayload {
            label: "round".to_string(),
        })
    }

    fn search() -> NodePayload {
        NodePayload::Search(SearchPayload {
            query: "rust".to_string(),
            time_filter: Default::default(),
            provider: Default::default(),
            test_mode: false,
            optimized: None,
        })
    }

    fn selection(urls: &[&str]) -> NodePayload {
        NodePayload::Selection(SelectionPayload {
            results: urls
                .iter()
                .enumerate()
                .map(|(i, u)| SearchResult::new(format!("r{}", i), *u, "t", "s"))
                .collect(),
            prompt_draft: "brief".to_string(),
            analysis: String::new(),
        })
    }

    fn ready_report(title: &str) -> NodePayload {
        NodePayload::Report(ReportPayload {
            report: Some(Report {
                title: title.to_string(),
                summary: String::new(),
                sections: vec![],
                sources: vec![],
            }),
            ..Default::default()
        })
    }

    fn create(state: &mut GraphState, parent: Option<&str>, payload: NodePayload, status: NodeStatus) -> NodeId {
        let node = ResearchNode::new(parent.map(str::to_string), payload, status);
        let id = node.id.clone();
        state.apply(Intent::CreateNode(node)).unwrap();
        id
    }

    /// group -> search -> selection -> report (Ready) -> followup (Ready)
    fn round(state: &mut GraphState) -> (NodeId, NodeId, NodeId, NodeId, NodeId) {
        let g = create(state, None, group(), NodeStatus::Ready);
        let s = create(state, Some(&g), search(), NodeStatus::Ready);
        let sel = create(state, Some(&s), selection(&["https://a.com"]), NodeStatus::Ready);
        let r = create(state, Some(&sel), ready_report("R"), NodeStatus::Ready);
        let f = create(
            state,
            Some(&r),
            NodePayload::FollowUp(FollowUpPayload::default()),
            NodeStatus::Ready,
        );
        (g, s, sel, r, f)
    }

    #[test]
    fn test_create_links_parent_and_edge() {
        let mut state = GraphState::new();
        let (g, s, ..) = round(&mut state);

        assert_eq!(state.node(&g).unwrap().child_ids, vec![s.clone()]);
        assert!(state.edges().contains(&Edge {
            from: g.clone(),
            to: s,
            kind: EdgeKind::Tree
        }));
        assert_eq!(state.roots().len(), 1);
    }

    #[test]
    fn test_illegal_placements_are_rejected() {
        let mut state = GraphState::new();
        let (g, s, ..) = round(&mut state);

        let orphan = ResearchNode::new(None, search(), NodeStatus::Pending);
        assert!(state.apply(Intent::CreateNode(orphan)).is_err());

        let misplaced = ResearchNode::new(Some(g), selection(&[]), NodeStatus::Pending);
        assert!(state.apply(Intent::CreateNode(misplaced)).is_err());

        let missing_parent =
            ResearchNode::new(Some("search-missing".to_string()), selection(&[]), NodeStatus::Pending);
        assert!(matches!(
            state.apply(Intent::CreateNode(missing_parent)),
            Err(AppError::NotFound(_))
        ));

        let failed = ResearchNode::new(Some(s), selection(&[]), NodeStatus::Failed);
        assert!(state.apply(Intent::CreateNode(failed)).is_err());
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut state = GraphState::new();
        let g = create(&mut state, None, group(), NodeStatus::Ready);
        let s = create(&mut state, Some(&g), search(), NodeStatus::Pending);

        assert!(state
            .apply(Intent::CompleteStage { id: s.clone(), payload: search() })
            .is_err());
        state.apply(Intent::AdvanceStage { id: s.clone() }).unwrap();
        state
            .apply(Intent::FailStage {
                id: s.clone(),
                error: "boom".to_string(),
            })
            .unwrap();

        let node = state.node(&s).unwrap();
        assert_eq!(node.status, NodeStatus::Failed);
        assert_eq!(node.error.as_deref(), Some("boom"));
        assert!(matches!(
            state.apply(Intent::AdvanceStage { id: s }),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_complete_requires_matching_kind() {
        let mut state = GraphState::new();
        let g = create(&mut state, None, group(), NodeStatus::Ready);
        let s = create(&mut state, Some(&g), search(), NodeStatus::Loading);
        let before = state.clone();

        let err = state
            .apply(Intent::CompleteStage { id: s, payload: group() })
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_add_result_dedups_by_url() {
        let mut state = GraphState::new();
        let (_, _, sel, ..) = round(&mut state);

        let dup = SearchResult::new("x", "https://a.com", "A", "");
        assert!(state
            .apply(Intent::AddResult { selection: sel.clone(), result: dup })
            .is_err());
        let fresh = SearchResult::new("y", "https://b.com", "B", "");
        state
            .apply(Intent::AddResult { selection: sel.clone(), result: fresh })
            .unwrap();

        match &state.node(&sel).unwrap().payload {
            NodePayload::Selection(p) => assert_eq!(p.results.len(), 2),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_record_scores_defaults_unscored_to_zero() {
        let mut state = GraphState::new();
        let g = create(&mut state, None, group(), NodeStatus::Ready);
        let s = create(&mut state, Some(&g), search(), NodeStatus::Ready);
        let sel = create(
            &mut state,
            Some(&s),
            selection(&["https://a.com", "https://b.com"]),
            NodeStatus::Ready,
        );

        state
            .apply(Intent::RecordScores {
                selection: sel.clone(),
                outcome: RankingOutcome {
                    rankings: vec![Ranking {
                        url: "https://a.com".to_string(),
                        score: 0.8,
                        reasoning: String::new(),
                    }],
                    analysis: "good".to_string(),
                },
            })
            .unwrap();

        match &state.node(&sel).unwrap().payload {
            NodePayload::Selection(p) => {
                assert_eq!(p.results[0].score, 0.8);
                assert_eq!(p.results[1].score, 0.0);
                assert_eq!(p.analysis, "good");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_toggle_selection_requires_ready_report() {
        let mut state = GraphState::new();
        let (_, _, sel, r, _) = round(&mut state);

        state.apply(Intent::ToggleReportSelection { id: r.clone() }).unwrap();
        assert_eq!(state.selected_reports(), &[r.clone()]);
        state.apply(Intent::ToggleReportSelection { id: r }).unwrap();
        assert!(state.selected_reports().is_empty());

        let pending = create(
            &mut state,
            Some(&sel),
            NodePayload::Report(ReportPayload::default()),
            NodeStatus::Loading,
        );
        assert!(state.apply(Intent::ToggleReportSelection { id: pending }).is_err());
        assert!(state.apply(Intent::ToggleReportSelection { id: sel }).is_err());
    }

    #[test]
    fn test_delete_removes_subtree_and_retires_ids() {
        let mut state = GraphState::new();
        let (g, s, sel, r, f) = round(&mut state);
        let (_, _, _, other, _) = round(&mut state);
        state.apply(Intent::ToggleReportSelection { id: r.clone() }).unwrap();

        let cg = create(&mut state, None, group(), NodeStatus::Ready);
        let merged = create(&mut state, Some(&cg), ready_report("M"), NodeStatus::Ready);
        state
            .apply(Intent::LinkNodes { from: r.clone(), to: merged.clone() })
            .unwrap();
        state
            .apply(Intent::LinkNodes { from: other.clone(), to: merged.clone() })
            .unwrap();

        state.apply(Intent::DeleteNode { id: sel.clone() }).unwrap();

        for id in [&sel, &r, &f] {
            assert!(state.node(id).is_none());
            assert!(state.is_retired(id));
        }
        assert!(state.node(&g).is_some());
        assert!(state.node(&s).unwrap().child_ids.is_empty());
        assert!(state.selected_reports().is_empty());
        assert_eq!(state.contributors_of(&merged), vec![other]);
        assert!(state.edges().iter().all(|e| e.from != r && e.to != r));

        let reused = ResearchNode {
            id: r,
            ..ResearchNode::new(Some(s), selection(&[]), NodeStatus::Ready)
        };
        assert!(state.apply(Intent::CreateNode(reused)).is_err());
    }

    #[test]
    fn test_group_members_stop_at_nested_groups() {
        let mut state = GraphState::new();
        let (g, s, sel, r, f) = round(&mut state);
        let nested = create(&mut state, Some(&r), group(), NodeStatus::Ready);
        let nested_search = create(&mut state, Some(&nested), search(), NodeStatus::Ready);

        let mut members = state.group_members(&g);
        members.sort();
        let mut expected = vec![s, sel, r.clone(), f.clone()];
        expected.sort();
        assert_eq!(members, expected);
        assert_eq!(state.group_members(&nested), vec![nested_search.clone()]);

        assert_eq!(state.ancestor_of_kind(&nested_search, NodeKind::Report).unwrap().id, r);
        assert_eq!(state.follow_up_of(&r).unwrap().id, f);
    }

    #[test]
    fn test_state_serde_round_trip() {
        let mut state = GraphState::new();
        round(&mut state);
        state.apply(Intent::SetTopic("rust".to_string())).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let back: GraphState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.topic(), "rust");
    }

    #[test]
    fn test_consistency_of_reducer_built_graph() {
        let mut state = GraphState::new();
        let (_, _, _, r, _) = round(&mut state);
        state.apply(Intent::ToggleReportSelection { id: r }).unwrap();

        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_consistency_rejects_broken_links() {
        let mut state = GraphState::new();
        let (g, s, _, r, f) = round(&mut state);

        let mut dangling_parent = state.clone();
        dangling_parent.nodes.get_mut(&f).unwrap().parent_id = Some("report-gone".to_string());
        assert!(matches!(
            dangling_parent.check_consistency(),
            Err(AppError::InvalidState(_))
        ));

        let mut one_way = state.clone();
        one_way.nodes.get_mut(&r).unwrap().child_ids.clear();
        assert!(one_way.check_consistency().is_err());

        let mut wrong_kind = state.clone();
        wrong_kind.nodes.get_mut(&g).unwrap().child_ids.clear();
        wrong_kind.nodes.get_mut(&s).unwrap().parent_id = None;
        assert!(wrong_kind.check_consistency().is_err());

        let mut stale_selection = state.clone();
        stale_selection.selected_reports.push("report-gone".to_string());
        assert!(stale_selection.check_consistency().is_err());

        let mut stale_edge = state;
        stale_edge.edges.push(Edge {
            from: r,
            to: "report-gone".to_string(),
            kind: EdgeKind::Consolidation,
        });
        assert!(stale_edge.check_consistency().is_err());
    }
}
