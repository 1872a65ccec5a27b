//! Stop and callback specs
//!
//! Verify stopping a running build, and that late or repeated reports for a
//! command leave the job untouched.

use crate::prelude::*;
use crate::prelude::assert_eq;
use flow_adapters::FakeAgentAdapter;
use flow_core::CmdStatus;
use flow_engine::{CallbackOutcome, DiscardReason, JobError};

const TWO_STEPS: &str = r#"
[[step]]
name = "a"
script = "true"

[[step]]
name = "b"
script = "sleep 30"
"#;

async fn wait_for_calls(agent: &FakeAgentAdapter, n: usize) {
    let wait = async {
        while agent.calls().len() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(SPEC_WAIT_MAX, wait).await.unwrap();
}

#[tokio::test]
async fn stop_while_a_step_runs() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    project.start();

    let job = project.service().create_job("demo").await.unwrap();
    let running = async {
        loop {
            let current = project.service().find(job.id).unwrap();
            if current.node_status("demo/b") == NodeStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(SPEC_WAIT_MAX, running).await.unwrap();

    let stopped = project.service().stop_job("demo", 1).await.unwrap();
    assert_eq!(stopped.status, JobStatus::Stopped);
    assert_eq!(
        project.statuses("demo", 1),
        rows(&[
            ("demo", NodeStatus::Stopped),
            ("demo/a", NodeStatus::Success),
            ("demo/b", NodeStatus::Stopped),
        ])
    );
    assert!(project.service().correlations().is_empty());

    // Stopping again changes nothing
    assert_eq!(project.service().stop_job("demo", 1).await.unwrap(), stopped);
    project.shutdown().await;
}

#[tokio::test]
async fn late_report_after_stop_is_discarded() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    let agent = FakeAgentAdapter::new();
    agent.hold("demo/a");
    project.start_with(project.config(), agent.clone());

    let job = project.service().create_job("demo").await.unwrap();
    wait_for_calls(&agent, 1).await;
    let stopped = project.service().stop_job("demo", job.build_number).await.unwrap();

    let a = agent.calls()[0].clone();
    let outcome = project.service().callback(a.reply(CmdStatus::Success, Some(0))).await;
    assert_eq!(outcome, CallbackOutcome::Discarded(DiscardReason::UnknownCommand));
    agent.release("demo/a");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(project.service().find(job.id).unwrap(), stopped);
    assert_eq!(agent.executed_paths(), vec!["demo/a".to_string()]);
    project.shutdown().await;
}

#[tokio::test]
async fn duplicate_report_is_discarded() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    let agent = FakeAgentAdapter::new();
    project.start_with(project.config(), agent.clone());

    let job = project.run("demo").await;
    let a = agent.calls()[0].clone();

    let outcome = project.service().callback(a.reply(CmdStatus::Failure, Some(1))).await;
    assert_eq!(outcome, CallbackOutcome::Discarded(DiscardReason::UnknownCommand));
    assert_eq!(project.service().find(job.id).unwrap(), job);
    project.shutdown().await;
}

#[tokio::test]
async fn single_build_policy_rejects_a_second_build() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    let agent = FakeAgentAdapter::new();
    agent.hold("demo/a");
    let mut config = project.config();
    config.allow_concurrent_builds = false;
    project.start_with(config, agent.clone());

    let first = project.service().create_job("demo").await.unwrap();
    let err = project.service().create_job("demo").await.unwrap_err();
    assert!(matches!(err, JobError::Conflict { build_number: 1, .. }), "{err}");

    agent.release("demo/a");
    project.wait(first.id).await;
    let second = project.service().create_job("demo").await.unwrap();
    assert_eq!(second.build_number, 2);
    project.shutdown().await;
}
