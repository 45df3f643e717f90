//! Application identity and the resource names derived from it

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::DeployError;
use crate::settings::ProxySettings;

const MAX_LEN: usize = 63;

/// Filesystem- and DNS-safe application identifier.
///
/// Lowercase ASCII letters, digits and `-`, starting and ending with an
/// alphanumeric character, at most 63 characters long. This value names the
/// remote directory, the container, the image, the compose project and the
/// proxy site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Validate an identifier as given
    pub fn parse(value: &str) -> Result<Self, DeployError> {
        let valid = !value.is_empty()
            && value.len() <= MAX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !value.starts_with('-')
            && !value.ends_with('-');

        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(DeployError::InvalidInput(format!(
                "Invalid application identifier: {:?}",
                value
            )))
        }
    }

    /// Derive the identifier from a repository URL: last path segment,
    /// extension stripped, normalised to the identifier alphabet.
    pub fn from_repo_url(url: &str) -> Result<Self, DeployError> {
        let trimmed = url.trim().trim_end_matches('/');
        let basename = trimmed
            .rsplit(|c| c == '/' || c == ':')
            .next()
            .unwrap_or_default();
        let stem = match basename.rfind('.') {
            Some(idx) if idx > 0 => &basename[..idx],
            _ => basename,
        };

        let mut id = String::with_capacity(stem.len());
        for c in stem.chars() {
            if c.is_ascii_alphanumeric() {
                id.push(c.to_ascii_lowercase());
            } else if !id.ends_with('-') {
                id.push('-');
            }
        }
        let id = id.trim_matches('-');
        let id = if id.len() > MAX_LEN {
            id[..MAX_LEN].trim_end_matches('-')
        } else {
            id
        };

        if id.is_empty() {
            return Err(DeployError::MissingInput(format!(
                "Cannot derive an application identifier from {:?}",
                url
            )));
        }
        Self::parse(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every remote resource name for this application
    pub fn resources(&self, ssh_user: &str, proxy: &ProxySettings) -> ResourceNames {
        ResourceNames::new(self.clone(), ssh_user, proxy)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote resource names shared by the deployment and cleanup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    app_id: AppId,
    remote_dir: String,
    site_file: PathBuf,
    site_link: PathBuf,
}

impl ResourceNames {
    pub fn new(app_id: AppId, ssh_user: &str, proxy: &ProxySettings) -> Self {
        let home = if ssh_user == "root" {
            "/root".to_string()
        } else {
            format!("/home/{}", ssh_user)
        };
        let remote_dir = format!("{}/{}", home, app_id);
        let site_file = proxy.sites_available.join(app_id.as_str());
        let site_link = proxy.sites_enabled.join(app_id.as_str());
        Self {
            app_id,
            remote_dir,
            site_file,
            site_link,
        }
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Remote application directory under the user's home
    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    /// Name of the single-container deployment; also the prefix matched
    /// when removing previous instances
    pub fn container_name(&self) -> &str {
        self.app_id.as_str()
    }

    /// Docker `name=` filter matching every container with the prefix
    pub fn container_filter(&self) -> String {
        format!("name=^{}", self.app_id)
    }

    /// Image repository (tag without `:latest`)
    pub fn image_repository(&self) -> &str {
        self.app_id.as_str()
    }

    pub fn image_tag(&self) -> String {
        format!("{}:latest", self.app_id)
    }

    pub fn compose_project(&self) -> &str {
        self.app_id.as_str()
    }

    pub fn site_name(&self) -> &str {
        self.app_id.as_str()
    }

    pub fn site_file(&self) -> &Path {
        &self.site_file
    }

    pub fn site_link(&self) -> &Path {
        &self.site_link
    }
}
