//! Projects
//!
//! A [`Project`] is a named research graph with timestamps. Projects are
//! kept in a [`ProjectStore`]; exactly one is marked current. While a graph
//! is being worked on, a [`ProjectPersister`] saves debounced snapshots.

pub mod persister;
pub mod store;

use crate::graph::GraphState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use persister::ProjectPersister;
pub use store::{FileProjectStore, MemoryProjectStore, ProjectStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Nodes, edges, last topic and consolidation selection
    #[serde(default)]
    pub graph: GraphState,
}

/// Listing entry for a stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub node_count: usize,
}

impl Project {
    /// An empty project
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("project-{}", Uuid::new_v4()),
            name: name.into(),
            created_at: now,
            updated_at: now,
            graph: GraphState::new(),
        }
    }

    /// A copy of `template`'s graph under a fresh id and timestamps
    pub fn from_template(template: &Project, name: impl Into<String>) -> Self {
        Self {
            graph: template.graph.clone(),
            ..Self::new(name)
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Replace the graph with a newer snapshot
    pub fn update_graph(&mut self, graph: GraphState) {
        self.graph = graph;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            node_count: self.graph.len(),
        }
    }
}
