//! Command line interface

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use secrecy::SecretString;

use crate::inputs::RawInputs;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// dockhand - deploy a git repository to a remote host behind nginx
#[derive(Parser)]
#[command(name = "dockhand")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(after_help = "Parameters that are not given are prompted for when running in a terminal.")]
pub struct Cli {
    /// Tear down the deployment instead of creating it
    #[arg(long)]
    pub cleanup: bool,

    /// Git repository URL
    #[arg(long, env = "DOCKHAND_REPO_URL")]
    pub repo_url: Option<String>,

    /// Access token for private http(s) repositories
    #[arg(long, env = "DOCKHAND_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Branch to deploy (default: main)
    #[arg(long)]
    pub branch: Option<String>,

    /// Server IP address or hostname
    #[arg(long)]
    pub host: Option<String>,

    /// SSH username
    #[arg(long)]
    pub user: Option<String>,

    /// Path to the SSH private key
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Port the application listens on inside the container
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Settings file (default: ./dockhand.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for the run log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log output as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Fail instead of prompting for missing parameters
    #[arg(long)]
    pub non_interactive: bool,
}

impl Cli {
    /// Parameters given on the command line or in the environment
    pub fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            repo_url: self.repo_url.clone(),
            token: self.token.clone().map(SecretString::from),
            branch: self.branch.clone(),
            host: self.host.clone(),
            user: self.user.clone(),
            key: self.key.clone(),
            port: self.port,
        }
    }
}
