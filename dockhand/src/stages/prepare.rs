//! Remote environment preparation

use tracing::info;

use crate::errors::DeployError;
use crate::exec::script::RemoteScript;
use crate::models::outcome::StageOutcome;
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;

const SERVICES: [&str; 2] = ["docker", "nginx"];

/// Build the preparation script. Every step checks before it acts, so a
/// second run against a prepared host only queries.
pub fn prepare_script(ctx: &StageContext<'_>) -> RemoteScript {
    let script = ctx.script();
    let sudo = script.sudo();

    let mut script = script
        .line("export DEBIAN_FRONTEND=noninteractive")
        .line("apt_updated=0")
        .line(format!(
            "apt_install() {{ if [ \"$apt_updated\" = 0 ]; then {sudo}apt-get update -qq; apt_updated=1; fi; {sudo}apt-get install -y -qq \"$@\"; }}"
        ))
        .line("if ! command -v docker >/dev/null 2>&1; then apt_install docker.io; fi")
        .line(
            "if ! docker compose version >/dev/null 2>&1 && ! command -v docker-compose >/dev/null 2>&1; then \
             apt_install docker-compose-v2 || apt_install docker-compose; fi",
        )
        .line("if ! command -v nginx >/dev/null 2>&1; then apt_install nginx; fi")
        .line("if ! command -v rsync >/dev/null 2>&1; then apt_install rsync; fi")
        .line("if ! command -v curl >/dev/null 2>&1; then apt_install curl; fi");

    for service in SERVICES {
        script = script.privileged(["systemctl", "enable", service]).line(format!(
            "if ! systemctl is-active --quiet {service}; then {sudo}systemctl start {service}; fi"
        ));
    }
    script
}

/// Ensure docker, a compose implementation, nginx, rsync and curl are
/// installed and the docker and nginx services are enabled and running
pub async fn prepare_remote(ctx: &StageContext<'_>) -> Result<StageOutcome, DeployError> {
    info!(
        "Preparing remote environment on {}",
        ctx.ssh.target().destination()
    );

    let output = ctx.ssh.exec(ctx.runner, &prepare_script(ctx)).await;
    if !output.success() {
        return Err(DeployError::RemotePrepare(format!(
            "Remote environment preparation failed: {}",
            output.last_line()
        )));
    }

    Ok(StageOutcome::succeeded(
        Stage::RemotePrepare,
        "docker, compose, nginx, rsync and curl available; docker and nginx running",
    ))
}
