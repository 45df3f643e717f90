//! Deployment pipeline tests against a fake host

use std::sync::Arc;

use tempfile::TempDir;

use dockhand::exec::command::CommandOutput;
use dockhand::models::descriptor::ContainerizationMode;
use dockhand::models::outcome::OutcomeStatus;
use dockhand::pipeline::fsm::{PipelineState, Stage};

use crate::support::{pipeline, sample_run, settings_in, FakeHost, FakeChecker};

#[tokio::test]
async fn test_sample_app_scenario() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    pipeline.deploy(&mut run).await.unwrap();

    assert_eq!(pipeline.state().await, PipelineState::Completed);
    let stages: Vec<Stage> = run.outcomes.iter().map(|o| o.stage).collect();
    assert_eq!(stages, Stage::FORWARD.to_vec());
    assert!(run
        .outcomes
        .iter()
        .all(|o| o.status == OutcomeStatus::Succeeded));
    assert_eq!(
        run.descriptor.as_ref().map(|d| d.mode()),
        Some(ContainerizationMode::Dockerfile)
    );
    assert!(dir.path().join("workspace/sample-app/Dockerfile").exists());

    let text = host.all_text();
    for expected in [
        "deploy@203.0.113.7:/home/deploy/sample-app/",
        "'mkdir' '-p' '/home/deploy/sample-app'",
        "'docker' 'build' '-t' 'sample-app:latest'",
        "'127.0.0.1:8080:8080' 'sample-app:latest'",
        "proxy_pass http://127.0.0.1:8080;",
        "'/etc/nginx/sites-available/sample-app'",
        "'http://127.0.0.1:8080/'",
    ] {
        assert!(text.contains(expected), "{expected}");
    }
    assert_eq!(checker.urls(), vec!["http://203.0.113.7/".to_string()]);
    assert_eq!(run.checks.len(), 3);
}

#[tokio::test]
async fn test_second_run_issues_same_remote_commands() {
    let dir = TempDir::new().unwrap();

    let first = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::status(200));
    let mut run = sample_run(None);
    pipeline(&first, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();
    let first_digest = run.outcome(Stage::ProxyConfig).unwrap().detail.clone();

    let second = Arc::new(FakeHost::dockerfile_app());
    let mut run = sample_run(None);
    pipeline(&second, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();
    let second_digest = run.outcome(Stage::ProxyConfig).unwrap().detail.clone();

    assert_eq!(first.remote_calls(), second.remote_calls());
    assert_eq!(first_digest, second_digest);

    // The second run updates the existing checkout instead of cloning
    let git_second: Vec<String> = second
        .calls()
        .into_iter()
        .filter(|c| c.program == "git")
        .map(|c| c.line)
        .collect();
    assert!(git_second.iter().all(|l| !l.contains(" clone ")));
    assert!(git_second.iter().any(|l| l.contains("merge --ff-only origin/main")));
}

#[tokio::test]
async fn test_old_containers_removed_before_run() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::status(200));
    let mut run = sample_run(None);
    pipeline(&host, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();

    let text = host.all_text();
    let remove = text.find("xargs -r sudo -n docker rm -f").unwrap();
    let start = text.find("'docker' 'run' '-d'").unwrap();
    assert!(remove < start);
}

#[tokio::test]
async fn test_switch_to_compose_removes_dockerfile_container() {
    let dir = TempDir::new().unwrap();
    let checker = Arc::new(FakeChecker::status(200));

    let first = Arc::new(FakeHost::dockerfile_app());
    let mut run = sample_run(None);
    pipeline(&first, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();

    // The repository gains a compose file upstream
    std::fs::write(
        dir.path().join("workspace/sample-app/compose.yaml"),
        "services: {}\n",
    )
    .unwrap();

    let second = Arc::new(FakeHost::dockerfile_app());
    let mut run = sample_run(None);
    pipeline(&second, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();

    assert_eq!(
        run.descriptor.as_ref().map(|d| d.mode()),
        Some(ContainerizationMode::Compose)
    );
    let text = second.all_text();
    let remove = text
        .find("docker ps -aq --filter 'name=^sample-app' | xargs -r sudo -n docker rm -f")
        .unwrap();
    let up = text
        .find("$COMPOSE -p 'sample-app' -f 'compose.yaml' up -d")
        .unwrap();
    assert!(remove < up);
    assert!(!text.contains("'docker' 'run'"));
}

#[tokio::test]
async fn test_missing_descriptor_completes_with_warning() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new().with_file("README.md", "# sample\n"));
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    pipeline.deploy(&mut run).await.unwrap();

    assert_eq!(pipeline.state().await, PipelineState::Completed);
    assert_eq!(
        run.outcome(Stage::Deploy).map(|o| o.status),
        Some(OutcomeStatus::Warning)
    );
    assert_eq!(
        run.outcome(Stage::RepositorySync).map(|o| o.status),
        Some(OutcomeStatus::Warning)
    );
    assert!(!host.all_text().contains("docker build"));
    assert!(!host.all_text().contains("'docker' 'build'"));
    // Only the public check runs when nothing was deployed
    assert_eq!(run.checks.len(), 1);
}

#[tokio::test]
async fn test_compose_repository() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(
        FakeHost::new()
            .with_file("Dockerfile", "FROM python:3\n")
            .with_file("docker-compose.yml", "services: {}\n")
            .healthy(),
    );
    let checker = Arc::new(FakeChecker::status(200));
    let mut run = sample_run(None);
    pipeline(&host, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();

    assert_eq!(
        run.descriptor.as_ref().map(|d| d.mode()),
        Some(ContainerizationMode::Compose)
    );
    let text = host.all_text();
    assert!(text.contains("$COMPOSE -p 'sample-app' -f 'docker-compose.yml' up -d"));
    assert!(!text.contains("'docker' 'build'"));
}

#[tokio::test]
async fn test_rejected_proxy_config_never_reloads() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app().on(
        "nginx -t",
        CommandOutput::new(3, "", "nginx: [emerg] unknown directive"),
    ));
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    let err = pipeline.deploy(&mut run).await.unwrap_err();

    assert_eq!(err.exit_code(), 7);
    assert_eq!(pipeline.state().await, PipelineState::Failed(Stage::ProxyConfig));
    assert_eq!(
        run.outcomes.last().map(|o| (o.stage, o.status)),
        Some((Stage::ProxyConfig, OutcomeStatus::Failed))
    );

    // Nothing runs after the failed proxy stage
    let calls = host.calls();
    let last = calls.last().unwrap().text();
    assert!(last.contains("nginx -t"));
    let exit = last.find("  exit 3").unwrap();
    let reload = last.find("'systemctl' 'reload' 'nginx'").unwrap();
    assert!(exit < reload);
    assert!(checker.urls().is_empty());
}

#[tokio::test]
async fn test_unreachable_public_endpoint_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::unreachable());
    let mut run = sample_run(None);

    pipeline(&host, &checker, settings_in(&dir))
        .deploy(&mut run)
        .await
        .unwrap();

    assert_eq!(
        run.outcome(Stage::Validate).map(|o| o.status),
        Some(OutcomeStatus::Warning)
    );
    assert_eq!(run.checks.iter().filter(|c| !c.passed).count(), 1);
}

#[tokio::test]
async fn test_connectivity_failure_stops_everything() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app().on(
        "dockhand-ssh-ok",
        CommandOutput::new(255, "", "deploy@203.0.113.7: Permission denied (publickey)."),
    ));
    let checker = Arc::new(FakeChecker::status(200));
    let pipeline = pipeline(&host, &checker, settings_in(&dir));
    let mut run = sample_run(None);

    let err = pipeline.deploy(&mut run).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("Permission denied"));
    assert_eq!(host.calls().len(), 1);
    assert_eq!(pipeline.state().await, PipelineState::Failed(Stage::Connectivity));
}

#[tokio::test]
async fn test_stage_failures_map_to_exit_codes() {
    let cases = [
        ("--single-branch", 3),
        ("apt_install", 4),
        ("--delete", 5),
        ("'docker' 'build'", 6),
    ];
    for (needle, code) in cases {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(
            FakeHost::dockerfile_app().on(needle, CommandOutput::new(1, "", "simulated failure")),
        );
        let checker = Arc::new(FakeChecker::status(200));
        let mut run = sample_run(None);

        let err = pipeline(&host, &checker, settings_in(&dir))
            .deploy(&mut run)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), code, "{needle}");
        assert!(run.outcomes.last().unwrap().is_failure());
    }
}

#[tokio::test]
async fn test_token_stays_out_of_config_and_logs() {
    const TOKEN: &str = "s3cr3t-token";
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::dockerfile_app());
    let checker = Arc::new(FakeChecker::status(200));

    for _ in 0..2 {
        let mut run = sample_run(Some(TOKEN));
        pipeline(&host, &checker, settings_in(&dir))
            .deploy(&mut run)
            .await
            .unwrap();
    }

    let calls = host.calls();
    let git: Vec<_> = calls.iter().filter(|c| c.program == "git").collect();

    // Rendered command lines never carry the token
    assert!(calls.iter().all(|c| !c.text().contains(TOKEN)));

    // Only clone and fetch receive it, in the URL credential slot
    let authenticated: Vec<_> = git
        .iter()
        .filter(|c| c.exposed.iter().any(|a| a.contains(TOKEN)))
        .collect();
    assert_eq!(authenticated.len(), 2);
    assert!(authenticated[0].exposed.contains(&"clone".to_string()));
    assert!(authenticated[1].exposed.contains(&"fetch".to_string()));
    assert!(authenticated
        .iter()
        .all(|c| c.exposed.contains(&format!("https://{}@example.com/sample-app.git", TOKEN))));

    // The stored remote is always reset to the bare URL
    let set_url: Vec<_> = git
        .iter()
        .filter(|c| c.exposed.contains(&"set-url".to_string()))
        .collect();
    assert_eq!(set_url.len(), 2);
    assert!(set_url
        .iter()
        .all(|c| c.exposed.last().map(String::as_str) == Some("https://example.com/sample-app.git")));
    assert!(git.iter().all(|c| c.line.starts_with("git -c credential.helper= ")));
}
