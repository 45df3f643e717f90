//! Pipeline driver

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::errors::DeployError;
use crate::exec::runner::CommandRunner;
use crate::exec::ssh::SshChannel;
use crate::models::descriptor::BuildDescriptor;
use crate::models::outcome::{PipelineRun, StageOutcome};
use crate::pipeline::fsm::{PipelineEvent, PipelineFsm, PipelineState, Stage};
use crate::settings::Settings;
use crate::stages::cleanup::cleanup_remote;
use crate::stages::connectivity::check_connectivity;
use crate::stages::deploy::deploy_containers;
use crate::stages::prepare::prepare_remote;
use crate::stages::proxy::configure_proxy;
use crate::stages::repo_sync::sync_repository;
use crate::stages::transfer::transfer_files;
use crate::stages::validate::{validate_deployment, HttpChecker};
use crate::stages::StageContext;

/// Runs the deployment or cleanup stages in order, recording every outcome
/// in the [`PipelineRun`] and tracking progress in a shared state machine
pub struct Pipeline {
    runner: Arc<dyn CommandRunner>,
    checker: Arc<dyn HttpChecker>,
    settings: Settings,
    fsm: Arc<RwLock<PipelineFsm>>,
}

impl Pipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        checker: Arc<dyn HttpChecker>,
        settings: Settings,
    ) -> Self {
        Self {
            runner,
            checker,
            settings,
            fsm: Arc::new(RwLock::new(PipelineFsm::new())),
        }
    }

    /// Shared handle on the state machine, readable while a run is in
    /// progress (e.g. from a signal handler)
    pub fn state_handle(&self) -> Arc<RwLock<PipelineFsm>> {
        self.fsm.clone()
    }

    /// Current pipeline state
    pub async fn state(&self) -> PipelineState {
        self.fsm.read().await.state().clone()
    }

    async fn transition(&self, event: PipelineEvent) -> Result<(), DeployError> {
        let mut fsm = self.fsm.write().await;
        fsm.process(event).map_err(DeployError::PipelineError)
    }

    async fn begin(&self, stage: Stage) -> Result<(), DeployError> {
        info!("==> {}", stage);
        self.transition(PipelineEvent::Begin(stage)).await
    }

    /// Record the result of the running stage. Failures are terminal.
    async fn settle(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        result: Result<StageOutcome, DeployError>,
    ) -> Result<(), DeployError> {
        match result {
            Ok(outcome) => {
                run.record(outcome);
                self.transition(PipelineEvent::StageSucceeded).await
            }
            Err(e) => {
                error!("{} failed: {}", stage, e);
                run.record(StageOutcome::failed(stage, e.to_string()));
                self.transition(PipelineEvent::StageFailed(e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    /// Deploy the repository to the target: connectivity, sync, prepare,
    /// transfer, deploy, proxy, validate
    pub async fn deploy(&self, run: &mut PipelineRun) -> Result<(), DeployError> {
        info!(
            "Deploying {} ({}) to {}",
            run.repository.url(),
            run.repository.branch(),
            run.target.destination()
        );
        let names = run
            .repository
            .app_id()
            .resources(run.target.user(), &self.settings.proxy);
        let ssh = SshChannel::new(run.target.clone(), &self.settings.ssh);
        let ctx = StageContext {
            runner: self.runner.as_ref(),
            ssh: &ssh,
            settings: &self.settings,
            names: &names,
        };
        let port = run.port;

        self.begin(Stage::Connectivity).await?;
        let result = check_connectivity(&ctx).await;
        self.settle(run, Stage::Connectivity, result).await?;

        self.begin(Stage::RepositorySync).await?;
        let synced = sync_repository(
            self.runner.as_ref(),
            &run.repository,
            &self.settings.work_dir,
        )
        .await;
        let sync = match synced {
            Ok(sync) => sync,
            Err(e) => return self.settle(run, Stage::RepositorySync, Err(e)).await,
        };
        run.descriptor = Some(sync.descriptor.clone());
        self.settle(run, Stage::RepositorySync, Ok(sync.outcome()))
            .await?;
        let descriptor = sync.descriptor;

        self.begin(Stage::RemotePrepare).await?;
        let result = prepare_remote(&ctx).await;
        self.settle(run, Stage::RemotePrepare, result).await?;

        self.begin(Stage::FileTransfer).await?;
        let result = transfer_files(&ctx, &sync.working_copy).await;
        self.settle(run, Stage::FileTransfer, result).await?;

        self.begin(Stage::Deploy).await?;
        let result = deploy_containers(&ctx, &descriptor, port).await;
        self.settle(run, Stage::Deploy, result).await?;

        self.begin(Stage::ProxyConfig).await?;
        let result = configure_proxy(&ctx, port).await;
        self.settle(run, Stage::ProxyConfig, result).await?;

        self.validate(&ctx, run, &descriptor, port).await?;

        self.transition(PipelineEvent::Finish).await?;
        info!("Deployment of {} finished", names.app_id());
        Ok(())
    }

    async fn validate(
        &self,
        ctx: &StageContext<'_>,
        run: &mut PipelineRun,
        descriptor: &BuildDescriptor,
        port: u16,
    ) -> Result<(), DeployError> {
        self.begin(Stage::Validate).await?;
        let result = validate_deployment(ctx, self.checker.as_ref(), descriptor.mode(), port)
            .await
            .map(|report| {
                run.checks = report.checks;
                report.outcome
            });
        self.settle(run, Stage::Validate, result).await
    }

    /// Tear down everything a deployment of this repository created on the
    /// target. Only connectivity failures are fatal.
    pub async fn cleanup(&self, run: &mut PipelineRun) -> Result<(), DeployError> {
        let names = run
            .repository
            .app_id()
            .resources(run.target.user(), &self.settings.proxy);
        info!(
            "Cleaning up {} on {}",
            names.app_id(),
            run.target.destination()
        );
        let ssh = SshChannel::new(run.target.clone(), &self.settings.ssh);
        let ctx = StageContext {
            runner: self.runner.as_ref(),
            ssh: &ssh,
            settings: &self.settings,
            names: &names,
        };

        self.begin(Stage::Connectivity).await?;
        let result = check_connectivity(&ctx).await;
        self.settle(run, Stage::Connectivity, result).await?;

        self.begin(Stage::Cleanup).await?;
        let report = cleanup_remote(&ctx).await;
        run.checks = report.checks;
        self.settle(run, Stage::Cleanup, Ok(report.outcome)).await?;

        self.transition(PipelineEvent::Finish).await
    }
}
