//! SSH connectivity check

use tracing::info;

use crate::errors::DeployError;
use crate::models::outcome::StageOutcome;
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;

const MARKER: &str = "dockhand-ssh-ok";

/// Verify the target accepts our key and runs commands. Nothing on the host
/// is modified.
pub async fn check_connectivity(ctx: &StageContext<'_>) -> Result<StageOutcome, DeployError> {
    let target = ctx.ssh.target();
    info!("Checking SSH connectivity to {}", target.destination());

    let script = ctx.script().command(["echo", MARKER]);
    let output = ctx.ssh.exec(ctx.runner, &script).await;

    if !output.success() {
        return Err(DeployError::Connectivity(format!(
            "Cannot reach {}: {}",
            target.destination(),
            output.last_line()
        )));
    }
    if !output.stdout.lines().any(|l| l.trim() == MARKER) {
        return Err(DeployError::Connectivity(format!(
            "Unexpected response from {}",
            target.destination()
        )));
    }

    Ok(StageOutcome::succeeded(
        Stage::Connectivity,
        format!("Connected to {}", target.destination()),
    ))
}
