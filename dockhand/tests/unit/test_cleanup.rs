//! Cleanup mode tests against a fake host

use std::sync::Arc;

use tempfile::TempDir;

use dockhand::exec::command::CommandOutput;
use dockhand::models::outcome::OutcomeStatus;
use dockhand::pipeline::fsm::{PipelineState, Stage};

use crate::support::{pipeline, sample_run, settings_in, FakeHost, FakeChecker};

#[tokio::test]
async fn test_cleanup_removes_every_resource() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new());
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    pipeline.cleanup(&mut run).await.unwrap();

    assert_eq!(pipeline.state().await, PipelineState::Completed);
    let stages: Vec<Stage> = run.outcomes.iter().map(|o| o.stage).collect();
    assert_eq!(stages, vec![Stage::Connectivity, Stage::Cleanup]);
    assert_eq!(
        run.outcome(Stage::Cleanup).map(|o| o.status),
        Some(OutcomeStatus::Succeeded)
    );
    assert_eq!(run.checks.len(), 6);
    assert!(run.checks.iter().all(|c| c.passed));

    let text = host.all_text();
    for expected in [
        "down --remove-orphans",
        "--filter 'name=^sample-app' | xargs -r sudo -n docker rm -f",
        "--filter 'reference=sample-app*'",
        "rm -f '/etc/nginx/sites-available/sample-app' '/etc/nginx/sites-enabled/sample-app'",
        "'systemctl' 'reload' 'nginx'",
        "'rm' '-rf' '--' '/home/deploy/sample-app'",
    ] {
        assert!(text.contains(expected), "{expected}");
    }

    // Cleanup never touches the local workspace or the network
    assert!(host.calls().iter().all(|c| c.program == "ssh"));
    assert!(checker.urls().is_empty());
}

#[tokio::test]
async fn test_failing_step_does_not_stop_cleanup() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new().on(
        "docker images -q",
        CommandOutput::new(1, "", "Cannot connect to the Docker daemon"),
    ));
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    pipeline.cleanup(&mut run).await.unwrap();

    assert_eq!(pipeline.state().await, PipelineState::Completed);
    assert_eq!(
        run.outcome(Stage::Cleanup).map(|o| o.status),
        Some(OutcomeStatus::Warning)
    );
    let failed: Vec<_> = run.checks.iter().filter(|c| !c.passed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "images removed");
    assert!(failed[0].detail.contains("Docker daemon"));

    // Steps after the failing one still ran
    assert!(host.all_text().contains("'rm' '-rf' '--' '/home/deploy/sample-app'"));
}

#[tokio::test]
async fn test_cleanup_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new());
    let checker = Arc::new(FakeChecker::status(200));

    for _ in 0..2 {
        let mut run = sample_run(None);
        pipeline(&host, &checker, settings_in(&dir))
            .cleanup(&mut run)
            .await
            .unwrap();
    }

    let calls = host.remote_calls();
    assert_eq!(calls.len(), 14);
    assert_eq!(calls[..7], calls[7..]);
}

#[tokio::test]
async fn test_cleanup_unreachable_host() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new().on(
        "dockhand-ssh-ok",
        CommandOutput::new(255, "", "ssh: connect to host 203.0.113.7 port 22: Connection timed out"),
    ));
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    let err = pipeline.cleanup(&mut run).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert_eq!(host.calls().len(), 1);
    assert_eq!(pipeline.state().await, PipelineState::Failed(Stage::Connectivity));
    assert!(run.outcome(Stage::Cleanup).is_none());
}

#[tokio::test]
async fn test_cleanup_after_deploy_removes_what_was_deployed() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::status(200));

    let mut run = sample_run(None);
    pipeline(&host, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();
    let deployed = host.calls().len();
    let deploy_text = host.all_text();
    for created in [
        "'--name' 'sample-app'",
        "'docker' 'build' '-t' 'sample-app:latest'",
        "ln -sfn '/etc/nginx/sites-available/sample-app' '/etc/nginx/sites-enabled/sample-app'",
        "'mkdir' '-p' '/home/deploy/sample-app'",
    ] {
        assert!(deploy_text.contains(created), "{created}");
    }

    let cleanup = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);
    cleanup.cleanup(&mut run).await.unwrap();

    assert_eq!(cleanup.state().await, PipelineState::Completed);
    assert_eq!(
        run.outcome(Stage::Cleanup).map(|o| o.status),
        Some(OutcomeStatus::Succeeded)
    );
    assert_eq!(run.checks.len(), 6);
    assert!(run.checks.iter().all(|c| c.passed));

    // Every resource the deploy created is targeted by name
    let removal: String = host.calls()[deployed..]
        .iter()
        .map(|c| c.text())
        .collect::<Vec<_>>()
        .join("\n");
    for expected in [
        "docker ps -aq --filter 'name=^sample-app' | xargs -r sudo -n docker rm -f",
        "--filter 'reference=sample-app*'",
        "rm -f '/etc/nginx/sites-available/sample-app' '/etc/nginx/sites-enabled/sample-app'",
        "'rm' '-rf' '--' '/home/deploy/sample-app'",
    ] {
        assert!(removal.contains(expected), "{expected}");
    }
    assert!(host.calls()[deployed..].iter().all(|c| c.program == "ssh"));
}
