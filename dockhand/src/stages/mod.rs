//! Pipeline stages
//!
//! Each stage takes its parameters explicitly and returns a
//! [`StageOutcome`](crate::models::outcome::StageOutcome) or the
//! stage-specific [`DeployError`](crate::errors::DeployError).

pub mod cleanup;
pub mod connectivity;
pub mod deploy;
pub mod prepare;
pub mod proxy;
pub mod repo_sync;
pub mod transfer;
pub mod validate;

use crate::exec::runner::CommandRunner;
use crate::exec::script::RemoteScript;
use crate::exec::ssh::SshChannel;
use crate::models::app_id::ResourceNames;
use crate::settings::Settings;

/// What every remote stage needs: how to run commands, where, and under
/// which names
pub struct StageContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub ssh: &'a SshChannel,
    pub settings: &'a Settings,
    pub names: &'a ResourceNames,
}

impl<'a> StageContext<'a> {
    /// A fail-fast script honouring the `use_sudo` setting
    pub fn script(&self) -> RemoteScript {
        RemoteScript::new(self.settings.remote.use_sudo)
    }
}
