//! Container build and run on the target

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::exec::script::{shell_quote, RemoteScript};
use crate::models::descriptor::{BuildDescriptor, ContainerizationMode};
use crate::models::outcome::StageOutcome;
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;

/// Shell snippet choosing `docker compose` or the standalone binary
pub(crate) const DETECT_COMPOSE: &str = "if docker compose version >/dev/null 2>&1; then COMPOSE='docker compose'; \
elif command -v docker-compose >/dev/null 2>&1; then COMPOSE='docker-compose'; \
else echo 'no docker compose implementation found' >&2; exit 1; fi";

/// Force-remove every container whose name starts with the application id
pub(crate) fn remove_prefixed_containers(ctx: &StageContext<'_>) -> String {
    let sudo = ctx.script().sudo();
    format!(
        "{sudo}docker ps -aq --filter {} | xargs -r {sudo}docker rm -f",
        shell_quote(&ctx.names.container_filter())
    )
}

/// Rebuild and restart a compose project from scratch. Containers left
/// under the application prefix by an earlier Dockerfile deployment are
/// removed as well, so only the compose project remains.
pub fn compose_script(ctx: &StageContext<'_>, file: &str) -> RemoteScript {
    let script = ctx.script();
    let sudo = script.sudo();
    let project = format!(
        "-p {} -f {}",
        shell_quote(ctx.names.compose_project()),
        shell_quote(file)
    );
    script
        .cd(ctx.names.remote_dir())
        .line(DETECT_COMPOSE)
        .line(format!("{sudo}$COMPOSE {project} down --remove-orphans"))
        .line(remove_prefixed_containers(ctx))
        .line(format!("{sudo}$COMPOSE {project} build --no-cache"))
        .line(format!("{sudo}$COMPOSE {project} up -d"))
}

/// Replace every container carrying the application prefix with a single
/// freshly built one, published on the host's loopback interface only
pub fn dockerfile_script(ctx: &StageContext<'_>, file: &str, port: u16) -> RemoteScript {
    let names = ctx.names;
    let script = ctx.script();
    let publish = format!("127.0.0.1:{port}:{port}");
    let image = names.image_tag();

    script
        .cd(names.remote_dir())
        .line(remove_prefixed_containers(ctx))
        .privileged(["docker", "build", "-t", image.as_str(), "-f", file, "."])
        .privileged([
            "docker",
            "run",
            "-d",
            "--name",
            names.container_name(),
            "--restart",
            "unless-stopped",
            "-p",
            publish.as_str(),
            image.as_str(),
        ])
}

/// Build and start the application according to its descriptor
pub async fn deploy_containers(
    ctx: &StageContext<'_>,
    descriptor: &BuildDescriptor,
    port: u16,
) -> Result<StageOutcome, DeployError> {
    let (script, detail) = match (descriptor.mode(), descriptor.file_name()) {
        (ContainerizationMode::Compose, Some(file)) => {
            info!("Deploying with docker compose ({})", file);
            (
                compose_script(ctx, file),
                format!("Compose project {} is up", ctx.names.compose_project()),
            )
        }
        (ContainerizationMode::Dockerfile, Some(file)) => {
            info!("Deploying with Dockerfile ({})", file);
            (
                dockerfile_script(ctx, file, port),
                format!(
                    "Container {} running {} on 127.0.0.1:{}",
                    ctx.names.container_name(),
                    ctx.names.image_tag(),
                    port
                ),
            )
        }
        _ => {
            warn!("No Dockerfile or compose file, nothing to deploy");
            return Ok(StageOutcome::warning(
                Stage::Deploy,
                "Nothing to deploy: no Dockerfile or compose file in the repository",
            ));
        }
    };

    let output = ctx.ssh.exec(ctx.runner, &script).await;
    if !output.success() {
        return Err(DeployError::Deployment(format!(
            "{} failed: {}",
            descriptor.mode(),
            output.last_line()
        )));
    }

    info!("{}", detail);
    Ok(StageOutcome::succeeded(Stage::Deploy, detail))
}
