//! Research graph
//!
//! A project's research is a graph of [`node::ResearchNode`]s. Each round
//! forms a tree `Group -> Search -> Selection -> Report -> FollowUp`;
//! branching hangs a new Group under a report, and consolidation adds a
//! report with one edge from every contributing report.

pub mod consolidate;
pub mod manager;
pub mod node;
pub mod state;

pub use consolidate::ConsolidationEngine;
pub use manager::{BranchTarget, ReportHandle, ReportMode, ResearchGraphManager, RoundHandle, RoundOptions};
pub use node::{Edge, EdgeKind, NodeId, NodeKind, NodePayload, NodeStatus, ResearchNode};
pub use state::{GraphState, Intent};
