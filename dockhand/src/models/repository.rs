//! Source repository description

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::errors::DeployError;
use crate::models::app_id::AppId;

/// Branch used when none is given
pub const DEFAULT_BRANCH: &str = "main";

/// Repository to deploy
#[derive(Debug)]
pub struct RepositorySpec {
    url: String,
    token: Option<SecretString>,
    branch: String,
    app_id: AppId,
}

impl RepositorySpec {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        branch: Option<String>,
    ) -> Result<Self, DeployError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(DeployError::MissingInput("repository URL".into()));
        }
        if url.starts_with('-') || url.chars().any(char::is_whitespace) {
            return Err(DeployError::InvalidInput(format!(
                "Invalid repository URL: {:?}",
                url
            )));
        }

        let branch = branch
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        validate_branch(&branch)?;

        let token = token.filter(|t| !t.expose_secret().trim().is_empty());
        let app_id = AppId::from_repo_url(&url)?;

        Ok(Self {
            url,
            token,
            branch,
            app_id,
        })
    }

    /// URL as given, without credentials. This is what stays in the
    /// working copy's git config.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Copy of the token for masking command output
    pub fn token_mask(&self) -> Option<SecretString> {
        self.token
            .as_ref()
            .map(|t| SecretString::from(t.expose_secret().trim().to_string()))
    }

    /// URL with the token in the credential slot, for network operations.
    /// `None` without a token: the bare URL is not secret.
    pub fn authenticated_url(&self) -> Result<Option<SecretString>, DeployError> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let mut parsed = Url::parse(&self.url).map_err(|e| {
            DeployError::InvalidInput(format!("Token given for non-URL remote {}: {}", self.url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeployError::InvalidInput(format!(
                "Access tokens are only supported for http(s) remotes, got {}",
                parsed.scheme()
            )));
        }
        parsed
            .set_username(token.expose_secret().trim())
            .map_err(|_| DeployError::InvalidInput("Cannot embed token into URL".into()))?;
        parsed
            .set_password(None)
            .map_err(|_| DeployError::InvalidInput("Cannot embed token into URL".into()))?;

        Ok(Some(SecretString::from(String::from(parsed))))
    }
}

fn validate_branch(branch: &str) -> Result<(), DeployError> {
    let valid = !branch.starts_with('-')
        && !branch.contains("..")
        && !branch.ends_with('/')
        && !branch.ends_with(".lock")
        && branch
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/'));
    if valid {
        Ok(())
    } else {
        Err(DeployError::InvalidInput(format!("Invalid branch name: {:?}", branch)))
    }
}
