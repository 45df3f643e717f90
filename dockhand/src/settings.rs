//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Settings file picked up from the current directory when present
pub const DEFAULT_SETTINGS_FILE: &str = "dockhand.json";

/// Deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level shown on the terminal
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for per-run log artifacts
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Base directory holding local working copies
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// SSH channel configuration
    #[serde(default)]
    pub ssh: SshSettings,

    /// Remote host behaviour
    #[serde(default)]
    pub remote: RemoteSettings,

    /// File transfer configuration
    #[serde(default)]
    pub transfer: TransferSettings,

    /// Reverse proxy configuration
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Post-deploy validation
    #[serde(default)]
    pub validation: ValidationSettings,
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("workspace")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: default_log_dir(),
            work_dir: default_work_dir(),
            ssh: SshSettings::default(),
            remote: RemoteSettings::default(),
            transfer: TransferSettings::default(),
            proxy: ProxySettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, or from `dockhand.json` in the
    /// current directory when it exists, or fall back to defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, DeployError> {
        let file = match explicit {
            Some(path) => {
                let file = File::new(path);
                if !file.exists().await {
                    return Err(DeployError::ConfigError(format!(
                        "Settings file not found: {}",
                        path.display()
                    )));
                }
                file
            }
            None => {
                let file = File::new(DEFAULT_SETTINGS_FILE);
                if !file.exists().await {
                    debug!("No settings file, using defaults");
                    return Ok(Self::default());
                }
                file
            }
        };

        debug!("Loading settings from {}", file.path().display());
        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would produce broken commands
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.ssh.port == 0 {
            return Err(DeployError::ConfigError("ssh.port must be non-zero".into()));
        }
        if self.proxy.sites_available.as_os_str().is_empty()
            || self.proxy.sites_enabled.as_os_str().is_empty()
        {
            return Err(DeployError::ConfigError(
                "proxy site directories must be set".into(),
            ));
        }
        let name_ok = self
            .proxy
            .server_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*' | ' '));
        if self.proxy.server_name.trim().is_empty() || !name_ok {
            return Err(DeployError::ConfigError(format!(
                "Invalid proxy.server_name: {:?}",
                self.proxy.server_name
            )));
        }
        Ok(())
    }
}

/// SSH settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Remote SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Remote host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Prefix privileged commands with `sudo -n`
    #[serde(default = "default_true")]
    pub use_sudo: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self { use_sudo: true }
    }
}

/// File transfer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Patterns passed to `rsync --exclude`
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

fn default_excludes() -> Vec<String> {
    vec![".git".to_string()]
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            exclude: default_excludes(),
        }
    }
}

/// Reverse proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Directory holding site definitions
    #[serde(default = "default_sites_available")]
    pub sites_available: PathBuf,

    /// Directory holding enabled-site links
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: PathBuf,

    /// `server_name` of the generated site
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Remove the distribution's `default` site link so the generated site
    /// answers requests addressed to the bare host IP.
    #[serde(default = "default_true")]
    pub disable_default_site: bool,
}

fn default_sites_available() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-available")
}

fn default_sites_enabled() -> PathBuf {
    PathBuf::from("/etc/nginx/sites-enabled")
}

fn default_server_name() -> String {
    "_".to_string()
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            sites_available: default_sites_available(),
            sites_enabled: default_sites_enabled(),
            server_name: default_server_name(),
            disable_default_site: true,
        }
    }
}

/// Validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Timeout of the public HTTP check, in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Public port the reverse proxy listens on
    #[serde(default = "default_public_port")]
    pub public_port: u16,
}

fn default_http_timeout() -> u64 {
    10
}

fn default_public_port() -> u16 {
    80
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            public_port: default_public_port(),
        }
    }
}
