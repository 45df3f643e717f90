//! Teardown of everything a deployment created on the target

use tracing::{info, warn};

use crate::exec::script::{shell_quote, RemoteScript};
use crate::models::outcome::{CheckResult, StageReport};
use crate::pipeline::fsm::Stage;
use crate::stages::deploy::{remove_prefixed_containers, DETECT_COMPOSE};
use crate::stages::StageContext;

/// Teardown steps in execution order, each run as its own remote script
pub fn cleanup_steps(ctx: &StageContext<'_>) -> Vec<(&'static str, RemoteScript)> {
    let names = ctx.names;
    let sudo = ctx.script().sudo();
    let dir = shell_quote(names.remote_dir());
    let file = shell_quote(&names.site_file().display().to_string());
    let link = shell_quote(&names.site_link().display().to_string());

    let compose_down = ctx
        .script()
        .line(format!("[ -d {dir} ] || exit 0"))
        .cd(names.remote_dir())
        .line(
            "file=$(find . -maxdepth 1 -type f \\( -iname docker-compose.yml -o -iname docker-compose.yaml \
             -o -iname compose.yml -o -iname compose.yaml \\) | sort | head -n 1)",
        )
        .line("[ -n \"$file\" ] || exit 0")
        .line(DETECT_COMPOSE)
        .line(format!(
            "{sudo}$COMPOSE -p {} -f \"$file\" down --remove-orphans",
            shell_quote(names.compose_project())
        ));

    let containers = ctx.script().line(remove_prefixed_containers(ctx));

    let images = ctx.script().line(format!(
        "{sudo}docker images -q --filter {} | sort -u | xargs -r {sudo}docker rmi -f",
        shell_quote(&format!("reference={}*", names.image_repository()))
    ));

    let site = ctx.script().line(format!("{sudo}rm -f {file} {link}"));

    let reload = ctx
        .script()
        .line(format!("if ! {sudo}nginx -t; then"))
        .line("  echo 'nginx -t failed, reload skipped' >&2")
        .line("  exit 1")
        .line("fi")
        .privileged(["systemctl", "reload", "nginx"]);

    let remote_dir = ctx
        .script()
        .privileged(["rm", "-rf", "--", names.remote_dir()]);

    vec![
        ("compose project down", compose_down),
        ("containers removed", containers),
        ("images removed", images),
        ("proxy site removed", site),
        ("nginx reloaded", reload),
        ("remote directory removed", remote_dir),
    ]
}

/// Remove the containers, images, proxy site and remote directory of the
/// application. Every step runs regardless of earlier failures; failures
/// are reported as warnings and never abort the run.
pub async fn cleanup_remote(ctx: &StageContext<'_>) -> StageReport {
    info!(
        "Cleaning up {} on {}",
        ctx.names.app_id(),
        ctx.ssh.target().destination()
    );

    let mut checks = Vec::new();
    for (name, script) in cleanup_steps(ctx) {
        let output = ctx.ssh.exec(ctx.runner, &script).await;
        if output.success() {
            info!("Cleanup: {}", name);
            checks.push(CheckResult::pass(name, "done"));
        } else {
            warn!("Cleanup step '{}' failed: {}", name, output.last_line());
            checks.push(CheckResult::fail(name, output.last_line()));
        }
    }
    StageReport::from_checks(Stage::Cleanup, checks)
}
