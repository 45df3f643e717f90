//! Stage outcomes and the per-run aggregate

use serde::Serialize;

use crate::models::descriptor::BuildDescriptor;
use crate::models::repository::RepositorySpec;
use crate::models::target::DeploymentTarget;
use crate::pipeline::fsm::Stage;

/// Result classification of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    /// Completed but incomplete, the run continues
    Warning,
    Failed,
}

/// Success or failure of one stage plus a human-readable cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl StageOutcome {
    pub fn succeeded(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: OutcomeStatus::Succeeded,
            detail: detail.into(),
        }
    }

    pub fn warning(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: OutcomeStatus::Warning,
            detail: detail.into(),
        }
    }

    pub fn failed(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: OutcomeStatus::Failed,
            detail: detail.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// One named post-deployment or cleanup check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Outcome of a stage made of individually reported checks
#[derive(Debug, Clone)]
pub struct StageReport {
    pub outcome: StageOutcome,
    pub checks: Vec<CheckResult>,
}

impl StageReport {
    /// Succeeded when every check passed, warning otherwise
    pub fn from_checks(stage: Stage, checks: Vec<CheckResult>) -> Self {
        let passed = checks.iter().filter(|c| c.passed).count();
        let summary = format!("{}/{} checks passed", passed, checks.len());
        let outcome = if passed == checks.len() {
            StageOutcome::succeeded(stage, summary)
        } else {
            StageOutcome::warning(stage, summary)
        };
        Self { outcome, checks }
    }
}

/// Everything one invocation knows about its deployment
#[derive(Debug)]
pub struct PipelineRun {
    pub target: DeploymentTarget,
    pub repository: RepositorySpec,
    /// Port the application listens on inside the container; published on
    /// the host's loopback interface under the same number
    pub port: u16,
    pub descriptor: Option<BuildDescriptor>,
    pub outcomes: Vec<StageOutcome>,
    pub checks: Vec<CheckResult>,
}

impl PipelineRun {
    pub fn new(target: DeploymentTarget, repository: RepositorySpec, port: u16) -> Self {
        Self {
            target,
            repository,
            port,
            descriptor: None,
            outcomes: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: StageOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().rev().find(|o| o.stage == stage)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StageOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Warning)
    }
}
