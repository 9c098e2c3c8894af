//! Project storage backends
//!
//! [`FileProjectStore`] keeps one pretty-printed `<id>.json` per project
//! plus a `current` pointer file in a directory. [`MemoryProjectStore`]
//! holds everything in memory.

use crate::project::{Project, ProjectSummary};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const CURRENT_FILE: &str = "current";

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load_project(&self, id: &str) -> Result<Project>;

    /// Insert or replace by id
    async fn save_project(&self, project: &Project) -> Result<()>;

    /// All projects, most recently updated first
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>>;

    /// Remove a project; clears the current pointer if it named it
    async fn delete_project(&self, id: &str) -> Result<()>;

    async fn current_project(&self) -> Result<Option<String>>;

    async fn set_current_project(&self, id: Option<&str>) -> Result<()>;

    /// Every project as a pretty JSON array
    async fn export_all(&self) -> Result<String> {
        let mut projects = Vec::new();
        for summary in self.list_projects().await? {
            projects.push(self.load_project(&summary.id).await?);
        }
        serde_json::to_string_pretty(&projects)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize projects: {}", e)))
    }

    /// Upsert every project from an [`export_all`](Self::export_all)
    /// document. Every project is checked before the first save; malformed
    /// input, a bad id or an inconsistent graph imports nothing and yields
    /// `false`.
    async fn import_all(&self, text: &str) -> Result<bool> {
        let projects: Vec<Project> = match serde_json::from_str(text) {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!("Rejected project import: {}", e);
                return Ok(false);
            }
        };
        if let Err(e) = projects.iter().try_for_each(check_importable) {
            tracing::warn!("Rejected project import: {}", e);
            return Ok(false);
        }
        for project in &projects {
            self.save_project(project).await?;
        }
        tracing::info!(count = projects.len(), "Imported projects");
        Ok(true)
    }
}

/// Project ids double as file names, so they are restricted to
/// `[A-Za-z0-9_-]+`
pub fn validate_project_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::InvalidInput(format!("Invalid project id '{}'", id)));
    }
    Ok(())
}

fn check_importable(project: &Project) -> Result<()> {
    validate_project_id(&project.id)?;
    project
        .graph
        .check_consistency()
        .map_err(|e| AppError::InvalidInput(format!("Project '{}': {}", project.id, e)))
}

fn sort_summaries(summaries: &mut [ProjectSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

// ============= File store =============

pub struct FileProjectStore {
    dir: PathBuf,
}

impl FileProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn project_path(&self, id: &str) -> Result<PathBuf> {
        validate_project_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    /// Write through a temporary file so a crash never leaves half a file
    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create project directory", &self.dir, e))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| io_error("rename", path, e))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Persistence(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    async fn load_project(&self, id: &str) -> Result<Project> {
        let path = self.project_path(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Project '{}' does not exist", id)))
            }
            Err(e) => return Err(io_error("read", &path, e)),
        };
        serde_json::from_str(&json)
            .map_err(|e| AppError::Persistence(format!("Corrupt project file {}: {}", path.display(), e)))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let path = self.project_path(&project.id)?;
        let json = serde_json::to_string_pretty(project)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize project: {}", e)))?;
        self.write_atomic(&path, &json).await?;
        tracing::debug!(id = %project.id, nodes = project.graph.len(), "Saved project");
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list", &self.dir, e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|json| serde_json::from_str::<Project>(&json).map_err(|e| e.to_string()));
            match parsed {
                Ok(project) => summaries.push(project.summary()),
                Err(e) => tracing::warn!(path = %path.display(), "Skipping unreadable project: {}", e),
            }
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        let path = self.project_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Project '{}' does not exist", id)))
            }
            Err(e) => return Err(io_error("delete", &path, e)),
        }
        if self.current_project().await?.as_deref() == Some(id) {
            self.set_current_project(None).await?;
        }
        tracing::info!(id, "Deleted project");
        Ok(())
    }

    async fn current_project(&self) -> Result<Option<String>> {
        let path = self.dir.join(CURRENT_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(id) => {
                let id = id.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn set_current_project(&self, id: Option<&str>) -> Result<()> {
        let path = self.dir.join(CURRENT_FILE);
        match id {
            Some(id) => {
                self.project_path(id)?;
                self.write_atomic(&path, id).await
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error("delete", &path, e)),
            },
        }
    }
}

// ============= Memory store =============

#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<BTreeMap<String, Project>>,
    current: RwLock<Option<String>>,
    saves: AtomicUsize,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_project` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn load_project(&self, id: &str) -> Result<Project> {
        self.projects
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Project '{}' does not exist", id)))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        self.projects
            .write()
            .insert(project.id.clone(), project.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut summaries: Vec<ProjectSummary> =
            self.projects.read().values().map(Project::summary).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete_project(&self, id: &str) -> Result<()> {
        if self.projects.write().remove(id).is_none() {
            return Err(AppError::NotFound(format!("Project '{}' does not exist", id)));
        }
        let mut current = self.current.write();
        if current.as_deref() == Some(id) {
            *current = None;
        }
        Ok(())
    }

    async fn current_project(&self) -> Result<Option<String>> {
        Ok(self.current.read().clone())
    }

    async fn set_current_project(&self, id: Option<&str>) -> Result<()> {
        *self.current.write() = id.map(str::to_string);
        Ok(())
    }
}
