//! Post-deployment validation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::DeployError;
use crate::exec::script::quote_argv;
use crate::models::descriptor::ContainerizationMode;
use crate::models::outcome::{CheckResult, StageReport};
use crate::pipeline::fsm::Stage;
use crate::stages::StageContext;

pub const CHECK_CONTAINER: &str = "container running";
pub const CHECK_LOCAL_HTTP: &str = "application responds on host";
pub const CHECK_PUBLIC_HTTP: &str = "public endpoint reachable";

/// Issues HTTP requests from the operator's machine
#[async_trait]
pub trait HttpChecker: Send + Sync {
    /// Status code of a GET to `url`, or a description of why no response
    /// arrived
    async fn get_status(&self, url: &Url) -> Result<u16, String>;
}

/// [`HttpChecker`] backed by reqwest
pub struct ReqwestChecker {
    client: Client,
}

impl ReqwestChecker {
    pub fn new(timeout_secs: u64) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpChecker for ReqwestChecker {
    async fn get_status(&self, url: &Url) -> Result<u16, String> {
        debug!("GET {}", url);
        self.client
            .get(url.clone())
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| e.to_string())
    }
}

/// Public URL of the proxy on the target
pub fn public_url(host: &str, port: u16) -> Result<Url, DeployError> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    Url::parse(&format!("http://{}:{}/", host, port))
        .map_err(|e| DeployError::InvalidInput(format!("Invalid host {}: {}", host, e)))
}

async fn check_container(ctx: &StageContext<'_>) -> CheckResult {
    let script = ctx.script().privileged([
        "docker",
        "ps",
        "--filter",
        ctx.names.container_filter().as_str(),
        "--filter",
        "status=running",
        "--format",
        "{{.Names}}",
    ]);
    let output = ctx.ssh.exec(ctx.runner, &script).await;
    let running: Vec<&str> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if output.success() && !running.is_empty() {
        CheckResult::pass(CHECK_CONTAINER, running.join(", "))
    } else if output.success() {
        CheckResult::fail(
            CHECK_CONTAINER,
            format!("no running container matches {}", ctx.names.container_filter()),
        )
    } else {
        CheckResult::fail(CHECK_CONTAINER, output.last_line())
    }
}

async fn check_local_http(ctx: &StageContext<'_>, port: u16) -> CheckResult {
    let url = format!("http://127.0.0.1:{}/", port);
    let timeout = ctx.settings.validation.http_timeout_secs.to_string();
    let curl = quote_argv([
        "curl",
        "-s",
        "-o",
        "/dev/null",
        "-w",
        "%{http_code}",
        "--max-time",
        timeout.as_str(),
        url.as_str(),
    ]);
    let script = ctx.script().line(format!("{} || true", curl));
    let output = ctx.ssh.exec(ctx.runner, &script).await;
    let code = output.stdout.trim();

    match code {
        _ if !output.success() => CheckResult::fail(CHECK_LOCAL_HTTP, output.last_line()),
        "" | "000" => CheckResult::fail(CHECK_LOCAL_HTTP, format!("no response from {}", url)),
        code => CheckResult::pass(CHECK_LOCAL_HTTP, format!("HTTP {} from {}", code, url)),
    }
}

async fn check_public_http(checker: &dyn HttpChecker, url: &Url) -> CheckResult {
    match checker.get_status(url).await {
        Ok(status) if status < 500 => {
            CheckResult::pass(CHECK_PUBLIC_HTTP, format!("HTTP {} from {}", status, url))
        }
        Ok(status) => CheckResult::fail(CHECK_PUBLIC_HTTP, format!("HTTP {} from {}", status, url)),
        Err(e) => CheckResult::fail(CHECK_PUBLIC_HTTP, format!("{}: {}", url, e)),
    }
}

/// Run the post-deployment checks. Failed checks degrade the outcome to a
/// warning; validation never fails the run.
pub async fn validate_deployment(
    ctx: &StageContext<'_>,
    checker: &dyn HttpChecker,
    mode: ContainerizationMode,
    port: u16,
) -> Result<StageReport, DeployError> {
    let url = public_url(ctx.ssh.target().host(), ctx.settings.validation.public_port)?;
    info!("Validating deployment (public endpoint {})", url);

    let mut checks = Vec::new();
    if mode == ContainerizationMode::None {
        debug!("Nothing was deployed, skipping container checks");
    } else {
        checks.push(check_container(ctx).await);
        checks.push(check_local_http(ctx, port).await);
    }
    checks.push(check_public_http(checker, &url).await);

    for check in checks.iter().filter(|c| !c.passed) {
        warn!("Check failed: {} ({})", check.name, check.detail);
    }

    Ok(StageReport::from_checks(Stage::Validate, checks))
}
