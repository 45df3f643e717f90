//! Finite state machine enforcing stage order

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stages in forward order, plus the cleanup branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connectivity,
    RepositorySync,
    RemotePrepare,
    FileTransfer,
    Deploy,
    ProxyConfig,
    Validate,
    Cleanup,
}

impl Stage {
    /// Forward deployment order
    pub const FORWARD: [Stage; 7] = [
        Stage::Connectivity,
        Stage::RepositorySync,
        Stage::RemotePrepare,
        Stage::FileTransfer,
        Stage::Deploy,
        Stage::ProxyConfig,
        Stage::Validate,
    ];

    /// The stage allowed to start after this one succeeds
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Connectivity => Some(Stage::RepositorySync),
            Stage::RepositorySync => Some(Stage::RemotePrepare),
            Stage::RemotePrepare => Some(Stage::FileTransfer),
            Stage::FileTransfer => Some(Stage::Deploy),
            Stage::Deploy => Some(Stage::ProxyConfig),
            Stage::ProxyConfig => Some(Stage::Validate),
            Stage::Validate | Stage::Cleanup => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Connectivity => "SSH connectivity",
            Stage::RepositorySync => "Repository sync",
            Stage::RemotePrepare => "Remote environment",
            Stage::FileTransfer => "File transfer",
            Stage::Deploy => "Container deployment",
            Stage::ProxyConfig => "Reverse proxy",
            Stage::Validate => "Validation",
            Stage::Cleanup => "Cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Nothing has run yet
    Pending,

    /// A stage is in progress
    Running(Stage),

    /// A stage finished and the next one may start
    Passed(Stage),

    /// Every stage of the chosen branch finished
    Completed,

    /// A stage failed; the run is over
    Failed(Stage),
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Start a stage
    Begin(Stage),

    /// The running stage finished
    StageSucceeded,

    /// The running stage failed
    StageFailed(String),

    /// Close the run after the last stage
    Finish,
}

/// Pipeline FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    error: Option<String>,
    passed: Vec<Stage>,
}

impl PipelineFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            error: None,
            passed: Vec::new(),
        }
    }

    /// Get current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Stages that finished, in order
    pub fn passed(&self) -> &[Stage] {
        &self.passed
    }

    /// The stage currently running, if any
    pub fn current_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Pending, PipelineEvent::Begin(Stage::Connectivity)) => {
                PipelineState::Running(Stage::Connectivity)
            }

            (PipelineState::Running(stage), PipelineEvent::StageSucceeded) => {
                self.passed.push(*stage);
                PipelineState::Passed(*stage)
            }
            (PipelineState::Running(stage), PipelineEvent::StageFailed(err)) => {
                self.error = Some(err.clone());
                PipelineState::Failed(*stage)
            }

            // Cleanup branches off once the host is known reachable
            (PipelineState::Passed(Stage::Connectivity), PipelineEvent::Begin(Stage::Cleanup)) => {
                PipelineState::Running(Stage::Cleanup)
            }
            (PipelineState::Passed(prev), PipelineEvent::Begin(next))
                if prev.next() == Some(*next) =>
            {
                PipelineState::Running(*next)
            }

            (PipelineState::Passed(Stage::Validate), PipelineEvent::Finish)
            | (PipelineState::Passed(Stage::Cleanup), PipelineEvent::Finish) => {
                PipelineState::Completed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
