//! File transfer to the target

use std::path::Path;

use tracing::info;

use crate::errors::DeployError;
use crate::exec::command::CommandSpec;
use crate::models::outcome::StageOutcome;
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;

/// rsync invocation mirroring `local_dir` into the remote application
/// directory. Files deleted locally are deleted remotely.
pub fn rsync_command(ctx: &StageContext<'_>, local_dir: &Path) -> CommandSpec {
    let mut cmd = CommandSpec::new("rsync").args(["-az", "--delete"]);
    for pattern in &ctx.settings.transfer.exclude {
        cmd = cmd.arg("--exclude").arg(pattern.as_str());
    }
    cmd.arg("-e")
        .arg(ctx.ssh.rsync_shell())
        .arg(format!("{}/", local_dir.display()))
        .arg(format!(
            "{}:{}/",
            ctx.ssh.target().destination(),
            ctx.names.remote_dir()
        ))
}

/// Create the remote directory and mirror the working copy into it
pub async fn transfer_files(
    ctx: &StageContext<'_>,
    local_dir: &Path,
) -> Result<StageOutcome, DeployError> {
    let remote_dir = ctx.names.remote_dir();
    info!("Transferring {} to {}", local_dir.display(), remote_dir);

    let mkdir = ctx.script().command(["mkdir", "-p", remote_dir]);
    let output = ctx.ssh.exec(ctx.runner, &mkdir).await;
    if !output.success() {
        return Err(DeployError::Transfer(format!(
            "Cannot create {}: {}",
            remote_dir,
            output.last_line()
        )));
    }

    let output = ctx.runner.run(&rsync_command(ctx, local_dir)).await;
    if !output.success() {
        return Err(DeployError::Transfer(format!(
            "rsync failed: {}",
            output.last_line()
        )));
    }

    Ok(StageOutcome::succeeded(
        Stage::FileTransfer,
        format!("Synchronized files to {}", remote_dir),
    ))
}
