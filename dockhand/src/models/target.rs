//! Remote host identity

use std::path::{Path, PathBuf};

use crate::errors::DeployError;

/// The remote host a run deploys to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    host: String,
    user: String,
    key_path: PathBuf,
}

impl DeploymentTarget {
    /// All three fields must be non-empty. The host and user end up on the
    /// `ssh` command line, so option-like or whitespace values are refused.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Result<Self, DeployError> {
        let host = host.into().trim().to_string();
        let user = user.into().trim().to_string();
        let key_path = key_path.into();

        if host.is_empty() {
            return Err(DeployError::MissingInput("remote host".into()));
        }
        if user.is_empty() {
            return Err(DeployError::MissingInput("SSH username".into()));
        }
        if key_path.as_os_str().is_empty() {
            return Err(DeployError::MissingInput("SSH private key path".into()));
        }

        let host_ok = !host.starts_with('-')
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'));
        if !host_ok {
            return Err(DeployError::InvalidInput(format!("Invalid host: {:?}", host)));
        }
        let user_ok = !user.starts_with('-')
            && user
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !user_ok {
            return Err(DeployError::InvalidInput(format!(
                "Invalid SSH username: {:?}",
                user
            )));
        }

        Ok(Self {
            host,
            user,
            key_path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// `user@host` as used by ssh and rsync
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}
