//! nginx reverse proxy configuration

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::exec::script::{shell_quote, RemoteScript};
use crate::models::outcome::StageOutcome;
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;
use crate::utils::sha256_hex;

/// Exit status of the install script when `nginx -t` rejects the new site
const STATUS_CONFIG_REJECTED: i32 = 3;

/// Rendered site definition together with its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub content: String,
    pub digest: String,
}

/// Render the nginx server block forwarding port 80 to the application on
/// the loopback interface
pub fn render_site_config(server_name: &str, port: u16) -> SiteConfig {
    let content = format!(
        "server {{
    listen 80;
    listen [::]:80;
    server_name {server_name};

    location / {{
        proxy_pass http://127.0.0.1:{port};
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"
    );
    let digest = sha256_hex(content.as_bytes());
    SiteConfig { content, digest }
}

/// Install the site transactionally: the previous definition is kept aside
/// until `nginx -t` accepts the new one, and reload only happens after a
/// passing test.
pub fn install_script(
    ctx: &StageContext<'_>,
    site: &SiteConfig,
) -> Result<RemoteScript, DeployError> {
    let proxy = &ctx.settings.proxy;
    let file = ctx.names.site_file().display().to_string();
    let link = ctx.names.site_link().display().to_string();
    let backup = format!("{}.dockhand-bak", file);
    let default_link = proxy.sites_enabled.join("default").display().to_string();

    let script = ctx.script();
    let sudo = script.sudo();
    let q_file = shell_quote(&file);
    let q_link = shell_quote(&link);
    let q_backup = shell_quote(&backup);

    let mut script = script
        .line(format!(
            "{sudo}mkdir -p {} {}",
            shell_quote(&proxy.sites_available.display().to_string()),
            shell_quote(&proxy.sites_enabled.display().to_string())
        ))
        .line("had_backup=0")
        .line(format!(
            "if [ -f {q_file} ]; then {sudo}cp -p {q_file} {q_backup}; had_backup=1; fi"
        ))
        .write_file(&file, &site.content, true)?
        .line(format!("{sudo}ln -sfn {q_file} {q_link}"))
        .line(format!("if ! {sudo}nginx -t; then"))
        .line(format!(
            "  if [ \"$had_backup\" = 1 ]; then {sudo}mv -f {q_backup} {q_file}; else {sudo}rm -f {q_file} {q_link}; fi"
        ))
        .line(format!("  exit {STATUS_CONFIG_REJECTED}"))
        .line("fi")
        .line(format!("{sudo}rm -f {q_backup}"));

    if proxy.disable_default_site {
        script = script.line(format!(
            "if [ -L {q} ]; then {sudo}rm -f {q}; fi",
            q = shell_quote(&default_link)
        ));
    }
    Ok(script.privileged(["systemctl", "reload", "nginx"]))
}

/// Write and enable the site definition, verify it and reload nginx
pub async fn configure_proxy(
    ctx: &StageContext<'_>,
    port: u16,
) -> Result<StageOutcome, DeployError> {
    let site = render_site_config(&ctx.settings.proxy.server_name, port);
    info!(
        "Configuring nginx site {} -> 127.0.0.1:{} (sha256 {})",
        ctx.names.site_name(),
        port,
        site.digest
    );

    let output = ctx.ssh.exec(ctx.runner, &install_script(ctx, &site)?).await;
    if output.status == STATUS_CONFIG_REJECTED {
        warn!("nginx rejected the new site; previous configuration restored");
        return Err(DeployError::ProxyConfig(format!(
            "nginx -t failed, configuration not reloaded: {}",
            output.last_line()
        )));
    }
    if !output.success() {
        return Err(DeployError::ProxyConfig(format!(
            "Proxy configuration failed: {}",
            output.last_line()
        )));
    }

    Ok(StageOutcome::succeeded(
        Stage::ProxyConfig,
        format!(
            "Site {} proxies to 127.0.0.1:{} (sha256 {})",
            ctx.names.site_name(),
            port,
            site.digest
        ),
    ))
}
