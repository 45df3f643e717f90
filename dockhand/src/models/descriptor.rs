//! Containerization mode detection

use std::fmt;

use serde::Serialize;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;

const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

const DOCKERFILE: &str = "dockerfile";

/// How the repository is built and started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerizationMode {
    Dockerfile,
    Compose,
    None,
}

impl fmt::Display for ContainerizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerizationMode::Dockerfile => "dockerfile",
            ContainerizationMode::Compose => "compose",
            ContainerizationMode::None => "none",
        };
        f.write_str(name)
    }
}

/// The mode together with the descriptor file that selected it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    mode: ContainerizationMode,
    file_name: Option<String>,
}

impl BuildDescriptor {
    pub fn none() -> Self {
        Self {
            mode: ContainerizationMode::None,
            file_name: None,
        }
    }

    pub fn dockerfile(file_name: impl Into<String>) -> Self {
        Self {
            mode: ContainerizationMode::Dockerfile,
            file_name: Some(file_name.into()),
        }
    }

    pub fn compose(file_name: impl Into<String>) -> Self {
        Self {
            mode: ContainerizationMode::Compose,
            file_name: Some(file_name.into()),
        }
    }

    pub fn mode(&self) -> ContainerizationMode {
        self.mode
    }

    /// Descriptor file name as it appears in the repository root
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Pick the descriptor from the names of the files in the repository
    /// root. Matching ignores case; a compose descriptor takes precedence
    /// over a Dockerfile because compose files usually build from it.
    pub fn from_file_names<S: AsRef<str>>(names: &[S]) -> Self {
        for candidate in COMPOSE_FILES {
            if let Some(name) = names
                .iter()
                .map(AsRef::as_ref)
                .find(|n| n.eq_ignore_ascii_case(candidate))
            {
                return Self::compose(name);
            }
        }

        names
            .iter()
            .map(AsRef::as_ref)
            .find(|n| n.eq_ignore_ascii_case(DOCKERFILE))
            .map(Self::dockerfile)
            .unwrap_or_else(Self::none)
    }

    /// Inspect a working copy root
    pub async fn detect(root: &Dir) -> Result<Self, DeployError> {
        let names = root.file_names().await?;
        Ok(Self::from_file_names(&names))
    }
}
