//! Error types for dockhand

use thiserror::Error;

use crate::pipeline::fsm::Stage;

/// Exit status reported when the run is interrupted by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SSH connectivity error: {0}")]
    Connectivity(String),

    #[error("Repository sync error: {0}")]
    RepositorySync(String),

    #[error("Remote environment error: {0}")]
    RemotePrepare(String),

    #[error("File transfer error: {0}")]
    Transfer(String),

    #[error("Deployment error: {0}")]
    Deployment(String),

    #[error("Proxy configuration error: {0}")]
    ProxyConfig(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Interrupted during {0}")]
    Interrupted(String),
}

impl DeployError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::MissingInput(_)
            | DeployError::InvalidInput(_)
            | DeployError::ConfigError(_) => 1,
            DeployError::Connectivity(_) => 2,
            DeployError::RepositorySync(_) => 3,
            DeployError::RemotePrepare(_) => 4,
            DeployError::Transfer(_) => 5,
            DeployError::Deployment(_) => 6,
            DeployError::ProxyConfig(_) => 7,
            DeployError::IoError(_)
            | DeployError::JsonError(_)
            | DeployError::HttpError(_)
            | DeployError::PipelineError(_)
            | DeployError::Internal(_) => 10,
            DeployError::Interrupted(_) => EXIT_INTERRUPTED,
        }
    }

    /// The pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DeployError::Connectivity(_) => Some(Stage::Connectivity),
            DeployError::RepositorySync(_) => Some(Stage::RepositorySync),
            DeployError::RemotePrepare(_) => Some(Stage::RemotePrepare),
            DeployError::Transfer(_) => Some(Stage::FileTransfer),
            DeployError::Deployment(_) => Some(Stage::Deploy),
            DeployError::ProxyConfig(_) => Some(Stage::ProxyConfig),
            _ => None,
        }
    }
}
