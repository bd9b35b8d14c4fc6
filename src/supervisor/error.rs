//! Supervisor error taxonomy.

use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("invalid process config: {0}")]
    Validation(String),

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("no process config named '{0}'")]
    ConfigNotFound(String),

    #[error("process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("failed to spawn '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate pid {pid}: {reason}")]
    Termination { pid: u32, reason: String },

    #[error(transparent)]
    Store(StoreError),
}

impl SupervisorError {
    /// Machine-readable code for the IPC/GUI layer.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::AlreadyRunning(_) => "ALREADY_RUNNING",
            Self::Spawn { .. } => "SPAWN_ERROR",
            Self::Termination { .. } => "TERMINATION_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<StoreError> for SupervisorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProjectNotFound(id) => Self::ProjectNotFound(id),
            other => Self::Store(other),
        }
    }
}
