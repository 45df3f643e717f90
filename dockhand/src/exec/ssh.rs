//! SSH channel to the deployment target

use crate::exec::command::{CommandOutput, CommandSpec};
use crate::exec::runner::CommandRunner;
use crate::exec::script::{shell_quote, RemoteScript};
use crate::models::target::DeploymentTarget;
use crate::settings::SshSettings;

/// Key-only, non-interactive SSH access to one host
#[derive(Debug, Clone)]
pub struct SshChannel {
    target: DeploymentTarget,
    port: u16,
    connect_timeout_secs: u64,
}

impl SshChannel {
    pub fn new(target: DeploymentTarget, settings: &SshSettings) -> Self {
        Self {
            target,
            port: settings.port,
            connect_timeout_secs: settings.connect_timeout_secs,
        }
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Options shared by ssh and rsync's remote shell. Unknown host keys
    /// are accepted on first contact; changed keys are still refused.
    fn options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.target.key_path().display().to_string(),
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ]
    }

    /// `ssh ... user@host bash -s` with the script on stdin
    pub fn script_command(&self, script: &RemoteScript) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(self.options())
            .arg(self.target.destination())
            .args(["bash", "-s"])
            .stdin(script.render())
    }

    /// Remote shell string for `rsync -e`
    pub fn rsync_shell(&self) -> String {
        let mut parts = vec!["ssh".to_string()];
        parts.extend(self.options().iter().map(|o| shell_quote(o)));
        parts.join(" ")
    }

    /// Run a script on the target
    pub async fn exec(&self, runner: &dyn CommandRunner, script: &RemoteScript) -> CommandOutput {
        runner.run(&self.script_command(script)).await
    }
}
