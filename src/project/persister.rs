//! Debounced project persistence
//!
//! The graph manager publishes a full snapshot after every change. The
//! persister waits until snapshots stop arriving for the debounce period
//! and then saves the latest one, so bursts of stage completions coalesce
//! into a single write (last writer wins).

use crate::graph::GraphState;
use crate::project::{Project, ProjectStore};
use crate::types::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

pub struct ProjectPersister {
    store: Arc<dyn ProjectStore>,
    project: Arc<Mutex<Project>>,
    updates: watch::Receiver<GraphState>,
    task: JoinHandle<()>,
}

impl ProjectPersister {
    /// Start saving snapshots from `updates` into `project`
    pub fn spawn(
        store: Arc<dyn ProjectStore>,
        project: Project,
        updates: watch::Receiver<GraphState>,
        debounce: Duration,
    ) -> Self {
        let project = Arc::new(Mutex::new(project));
        let task = tokio::spawn(run(
            store.clone(),
            project.clone(),
            updates.clone(),
            debounce,
        ));
        Self {
            store,
            project,
            updates,
            task,
        }
    }

    /// Save the latest snapshot now
    pub async fn flush(&self) -> Result<()> {
        save_latest(self.store.as_ref(), &self.project, &self.updates).await
    }

    /// Project as last saved
    pub async fn project(&self) -> Project {
        self.project.lock().await.clone()
    }

    /// Flush, stop the background task and hand back the saved project
    pub async fn shutdown(self) -> Result<Project> {
        self.flush().await?;
        self.task.abort();
        Ok(self.project().await)
    }
}

impl Drop for ProjectPersister {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    store: Arc<dyn ProjectStore>,
    project: Arc<Mutex<Project>>,
    mut updates: watch::Receiver<GraphState>,
    debounce: Duration,
) {
    while updates.changed().await.is_ok() {
        // Quiet period: restart the timer on every new snapshot.
        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = save_latest(store.as_ref(), &project, &updates).await {
            tracing::error!("Failed to persist project: {}", e);
        }
    }

    // Sender gone; make sure the final state is on disk.
    if let Err(e) = save_latest(store.as_ref(), &project, &updates).await {
        tracing::error!("Failed to persist project: {}", e);
    }
}

/// Reads the snapshot while holding the project lock so concurrent saves
/// can never write an older graph last.
async fn save_latest(
    store: &dyn ProjectStore,
    project: &Mutex<Project>,
    updates: &watch::Receiver<GraphState>,
) -> Result<()> {
    let mut project = project.lock().await;
    let snapshot = updates.borrow().clone();
    if snapshot != project.graph {
        project.update_graph(snapshot);
    }
    store.save_project(&project).await
}
