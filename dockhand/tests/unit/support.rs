//! Test doubles: a fake target host and a fake HTTP checker

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use url::Url;

use dockhand::exec::command::{CommandOutput, CommandSpec};
use dockhand::exec::runner::CommandRunner;
use dockhand::models::outcome::PipelineRun;
use dockhand::models::repository::RepositorySpec;
use dockhand::models::target::DeploymentTarget;
use dockhand::pipeline::run::Pipeline;
use dockhand::settings::Settings;
use dockhand::stages::validate::HttpChecker;

pub const SAMPLE_REPO: &str = "https://example.com/sample-app.git";
pub const HOST: &str = "203.0.113.7";

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    /// Rendered command line, secrets masked
    pub line: String,
    /// Arguments exactly as handed to the process
    pub exposed: Vec<String>,
    pub stdin: Option<String>,
}

impl Call {
    /// Command line and stdin together
    pub fn text(&self) -> String {
        match &self.stdin {
            Some(stdin) => format!("{}\n{}", self.line, stdin),
            None => self.line.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.program == "ssh" || self.program == "rsync"
    }
}

/// Answers commands by pattern and records them. `git clone` materializes
/// a checkout with the configured files so descriptor detection has
/// something to look at.
pub struct FakeHost {
    rules: Vec<(String, CommandOutput)>,
    checkout_files: Vec<(String, String)>,
    calls: Mutex<Vec<Call>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            rules: vec![(
                "dockhand-ssh-ok".to_string(),
                CommandOutput::new(0, "dockhand-ssh-ok\n", ""),
            )],
            checkout_files: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Healthy host with a Dockerfile repository
    pub fn dockerfile_app() -> Self {
        Self::new()
            .with_file("Dockerfile", "FROM nginx:alpine\n")
            .healthy()
    }

    pub fn healthy(self) -> Self {
        self.on("'status=running'", CommandOutput::new(0, "sample-app\n", ""))
            .on("%{http_code}", CommandOutput::new(0, "200", ""))
    }

    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.checkout_files
            .push((name.to_string(), content.to_string()));
        self
    }

    /// Rules added later take precedence
    pub fn on(mut self, needle: &str, output: CommandOutput) -> Self {
        self.rules.insert(0, (needle.to_string(), output));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remote_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(Call::is_remote)
            .map(|c| c.text())
            .collect()
    }

    pub fn all_text(&self) -> String {
        self.calls()
            .iter()
            .map(Call::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn materialize_clone(&self, exposed: &[String]) {
        let Some(dest) = exposed.last() else {
            return;
        };
        let dest = PathBuf::from(dest);
        std::fs::create_dir_all(dest.join(".git")).unwrap();
        for (name, content) in &self.checkout_files {
            std::fs::write(dest.join(name), content).unwrap();
        }
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, command: &CommandSpec) -> CommandOutput {
        let exposed: Vec<String> = command
            .exposed_args()
            .into_iter()
            .map(str::to_string)
            .collect();
        let call = Call {
            program: command.program().to_string(),
            line: command.to_string(),
            exposed: exposed.clone(),
            stdin: command.stdin_payload().map(str::to_string),
        };
        let text = call.text();
        self.calls.lock().unwrap().push(call);

        let output = self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::new(0, "", ""));

        if output.success() && command.program() == "git" && exposed.iter().any(|a| a == "clone") {
            self.materialize_clone(&exposed);
        }
        output
    }
}

/// Records requested URLs and answers with a fixed status
pub struct FakeChecker {
    status: Result<u16, String>,
    urls: Mutex<Vec<String>>,
}

impl FakeChecker {
    pub fn status(status: u16) -> Self {
        Self {
            status: Ok(status),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            status: Err("connection timed out".to_string()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpChecker for FakeChecker {
    async fn get_status(&self, url: &Url) -> Result<u16, String> {
        self.urls.lock().unwrap().push(url.to_string());
        self.status.clone()
    }
}

/// Settings whose working copies live in a temporary directory
pub fn settings_in(dir: &TempDir) -> Settings {
    Settings {
        work_dir: dir.path().join("workspace"),
        ..Settings::default()
    }
}

pub fn sample_run(token: Option<&str>) -> PipelineRun {
    PipelineRun::new(
        DeploymentTarget::new(HOST, "deploy", "/keys/id_ed25519").unwrap(),
        RepositorySpec::new(
            SAMPLE_REPO,
            token.map(|t| secrecy::SecretString::from(t.to_string())),
            None,
        )
        .unwrap(),
        8080,
    )
}

pub fn pipeline(host: &Arc<FakeHost>, checker: &Arc<FakeChecker>, settings: Settings) -> Pipeline {
    Pipeline::new(host.clone(), checker.clone(), settings)
}
