//! FSM unit tests

use dockhand::pipeline::fsm::{PipelineEvent, PipelineFsm, PipelineState, Stage};

fn run_through(fsm: &mut PipelineFsm, stages: &[Stage]) {
    for stage in stages {
        fsm.process(PipelineEvent::Begin(*stage)).unwrap();
        fsm.process(PipelineEvent::StageSucceeded).unwrap();
    }
}

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.state(), &PipelineState::Pending);
    assert!(fsm.error().is_none());
    assert!(fsm.passed().is_empty());
    assert_eq!(fsm.current_stage(), None);
}

#[test]
fn test_fsm_deploy_success_flow() {
    let mut fsm = PipelineFsm::new();

    // Pending -> Running(Connectivity)
    fsm.process(PipelineEvent::Begin(Stage::Connectivity)).unwrap();
    assert_eq!(fsm.state(), &PipelineState::Running(Stage::Connectivity));
    assert_eq!(fsm.current_stage(), Some(Stage::Connectivity));

    // Running -> Passed
    fsm.process(PipelineEvent::StageSucceeded).unwrap();
    assert_eq!(fsm.state(), &PipelineState::Passed(Stage::Connectivity));

    run_through(&mut fsm, &Stage::FORWARD[1..]);
    fsm.process(PipelineEvent::Finish).unwrap();

    assert_eq!(fsm.state(), &PipelineState::Completed);
    assert_eq!(fsm.passed(), &Stage::FORWARD[..]);
}

#[test]
fn test_fsm_cleanup_flow() {
    let mut fsm = PipelineFsm::new();

    run_through(&mut fsm, &[Stage::Connectivity, Stage::Cleanup]);
    fsm.process(PipelineEvent::Finish).unwrap();

    assert_eq!(fsm.state(), &PipelineState::Completed);
    assert_eq!(fsm.passed(), &[Stage::Connectivity, Stage::Cleanup]);
}

#[test]
fn test_fsm_stages_cannot_be_skipped() {
    let mut fsm = PipelineFsm::new();
    assert!(fsm.process(PipelineEvent::Begin(Stage::RepositorySync)).is_err());

    run_through(&mut fsm, &[Stage::Connectivity, Stage::RepositorySync]);

    // Transfer before prepare
    assert!(fsm.process(PipelineEvent::Begin(Stage::FileTransfer)).is_err());
    // Cleanup only branches off right after connectivity
    assert!(fsm.process(PipelineEvent::Begin(Stage::Cleanup)).is_err());
    // Finishing early
    assert!(fsm.process(PipelineEvent::Finish).is_err());

    assert_eq!(fsm.state(), &PipelineState::Passed(Stage::RepositorySync));
}

#[test]
fn test_fsm_failure_is_terminal() {
    let mut fsm = PipelineFsm::new();

    run_through(&mut fsm, &Stage::FORWARD[..5]);
    fsm.process(PipelineEvent::Begin(Stage::ProxyConfig)).unwrap();
    fsm.process(PipelineEvent::StageFailed("nginx -t failed".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &PipelineState::Failed(Stage::ProxyConfig));
    assert_eq!(fsm.error(), Some("nginx -t failed"));
    assert_eq!(fsm.current_stage(), None);

    assert!(fsm.process(PipelineEvent::Begin(Stage::Validate)).is_err());
    assert!(fsm.process(PipelineEvent::Finish).is_err());
    assert!(fsm.process(PipelineEvent::StageSucceeded).is_err());
}

#[test]
fn test_fsm_state_serialization() {
    let json = serde_json::to_string(&PipelineState::Running(Stage::FileTransfer)).unwrap();
    assert_eq!(json, r#"{"running":"file_transfer"}"#);

    let state: PipelineState = serde_json::from_str(r#""completed""#).unwrap();
    assert_eq!(state, PipelineState::Completed);
}
