//! Run parameters from flags, environment and interactive prompts

use std::path::{Path, PathBuf};

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use secrecy::SecretString;

use crate::errors::DeployError;
use crate::models::outcome::PipelineRun;
use crate::models::repository::{RepositorySpec, DEFAULT_BRANCH};
use crate::models::target::DeploymentTarget;

/// Internal application port offered when none is given
pub const DEFAULT_APP_PORT: u16 = 8080;

/// Parameters as supplied on the command line or in the environment; any
/// of them may be missing
#[derive(Debug, Default)]
pub struct RawInputs {
    pub repo_url: Option<String>,
    pub token: Option<SecretString>,
    pub branch: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub key: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Asks the operator for a missing value
pub trait Prompter {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String, DeployError>;

    /// Hidden input; may be empty
    fn secret(&self, prompt: &str) -> Result<SecretString, DeployError>;
}

/// Terminal prompts
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for DialoguerPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for DialoguerPrompter {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String, DeployError> {
        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .map_err(|e| prompt_failed(prompt, e))
    }

    fn secret(&self, prompt: &str) -> Result<SecretString, DeployError> {
        let value = Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| prompt_failed(prompt, e))?;
        Ok(SecretString::from(value))
    }
}

fn prompt_failed(prompt: &str, err: dialoguer::Error) -> DeployError {
    DeployError::MissingInput(format!("{} (prompt aborted: {})", prompt, err))
}

/// Collects the run parameters, prompting for what is missing when a
/// prompter is available and failing with [`DeployError::MissingInput`]
/// otherwise
pub struct InputCollector<'a> {
    prompter: Option<&'a dyn Prompter>,
}

impl<'a> InputCollector<'a> {
    pub fn new(prompter: Option<&'a dyn Prompter>) -> Self {
        Self { prompter }
    }

    fn required(
        &self,
        value: Option<String>,
        prompt: &str,
        default: Option<&str>,
    ) -> Result<String, DeployError> {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            return Ok(value.trim().to_string());
        }
        match self.prompter {
            Some(prompter) => {
                let value = prompter.text(prompt, default)?;
                if value.trim().is_empty() {
                    Err(DeployError::MissingInput(prompt.to_string()))
                } else {
                    Ok(value.trim().to_string())
                }
            }
            None => Err(DeployError::MissingInput(prompt.to_string())),
        }
    }

    fn optional(
        &self,
        value: Option<String>,
        prompt: &str,
        default: &str,
    ) -> Result<Option<String>, DeployError> {
        match (value, self.prompter) {
            (Some(value), _) => Ok(Some(value)),
            (None, Some(prompter)) => Ok(Some(prompter.text(prompt, Some(default))?)),
            (None, None) => Ok(None),
        }
    }

    /// Build the run description. Cleanup needs neither a token, a branch
    /// nor a port, so those are never prompted for in that mode.
    pub fn collect(&self, raw: RawInputs, cleanup: bool) -> Result<PipelineRun, DeployError> {
        let repo_url = self.required(raw.repo_url, "Git repository URL", None)?;

        let (token, branch) = if cleanup {
            (None, raw.branch)
        } else {
            let token = match (raw.token, self.prompter) {
                (Some(token), _) => Some(token),
                (None, Some(prompter)) => {
                    Some(prompter.secret("Access token (leave empty for public repositories)")?)
                }
                (None, None) => None,
            };
            (token, self.optional(raw.branch, "Branch", DEFAULT_BRANCH)?)
        };
        let repository = RepositorySpec::new(repo_url, token, branch)?;

        let user = self.required(raw.user, "SSH username", None)?;
        let host = self.required(raw.host, "Server IP address or hostname", None)?;
        let key = self.required(
            raw.key.map(|k| k.display().to_string()),
            "Path to SSH private key",
            Some("~/.ssh/id_rsa"),
        )?;
        let key = expand_home(&key, std::env::var_os("HOME").map(PathBuf::from).as_deref());
        let target = DeploymentTarget::new(host, user, key)?;

        let port = match (raw.port, cleanup) {
            (Some(port), _) => validate_port(port)?,
            (None, true) => DEFAULT_APP_PORT,
            (None, false) => {
                let default = DEFAULT_APP_PORT.to_string();
                let value = self.required(None, "Application internal port", Some(&default))?;
                parse_port(&value)?
            }
        };

        Ok(PipelineRun::new(target, repository, port))
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

fn validate_port(port: u16) -> Result<u16, DeployError> {
    if port == 0 {
        return Err(DeployError::InvalidInput("Port must be between 1 and 65535".into()));
    }
    Ok(port)
}

/// Parse an application port (1 to 65535)
pub fn parse_port(value: &str) -> Result<u16, DeployError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| DeployError::InvalidInput(format!("Invalid port: {:?}", value)))
        .and_then(validate_port)
}
