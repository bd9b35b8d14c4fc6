//! Persistence adapter for project/process configuration.
//!
//! The engine only depends on the [`ConfigStore`] trait; the JSON file
//! implementation below is the default backing used by the daemon and the
//! tests. The stored shape is the engine's, the storage format is the
//! adapter's.

use crate::config::{ProcessConfig, Project};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("project '{0}' not found")]
    ProjectNotFound(String),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Adapter contract consumed by the supervisor.
pub trait ConfigStore: Send + Sync {
    /// Fetch a project and its process configs.
    fn get_project(&self, project_id: &str) -> Result<Project, StoreError>;
    /// Replace a project's process list.
    fn save_processes(
        &self,
        project_id: &str,
        processes: Vec<ProcessConfig>,
    ) -> Result<(), StoreError>;
    /// All known project ids.
    fn project_ids(&self) -> Vec<String>;
}

/// File-backed store keeping every project in one JSON document.
/// Loaded once at construction, rewritten on every mutation.
pub struct JsonConfigStore {
    file_path: PathBuf,
    projects: Mutex<Vec<Project>>,
}

impl JsonConfigStore {
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file_path = file_path.into();
        let projects = if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            serde_json::from_str(&content)?
        } else {
            tracing::info!("Project store {:?} does not exist, starting empty", file_path);
            Vec::new()
        };
        Ok(Self {
            file_path,
            projects: Mutex::new(projects),
        })
    }

    /// Register a new project and return its generated id.
    pub fn create_project(&self, project: Project) -> Result<String, StoreError> {
        let mut projects = self.lock()?;
        let id = project.id.clone();
        projects.push(project);
        self.flush(&projects)?;
        Ok(id)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Project>>, StoreError> {
        self.projects.lock().map_err(|e| {
            tracing::error!("JsonConfigStore lock poisoned: {}", e);
            StoreError::LockPoisoned
        })
    }

    fn flush(&self, projects: &[Project]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(projects)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_project(&self, project_id: &str) -> Result<Project, StoreError> {
        let projects = self.lock()?;
        projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))
    }

    fn save_processes(
        &self,
        project_id: &str,
        processes: Vec<ProcessConfig>,
    ) -> Result<(), StoreError> {
        let mut projects = self.lock()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        project.processes = processes;
        self.flush(&projects)
    }

    fn project_ids(&self) -> Vec<String> {
        match self.lock() {
            Ok(projects) => projects.iter().map(|p| p.id.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
