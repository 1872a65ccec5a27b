//! Flow definition specs
//!
//! Verify how job creation resolves paths against flow files.

use crate::prelude::*;
use crate::prelude::assert_eq;
use flow_adapters::DefinitionError;
use flow_engine::JobError;

const DEMO: &str = r#"
[[step]]
name = "build"
script = "true"

[[step]]
name = "test"

[[step.step]]
name = "unit"
script = "true"
"#;

#[tokio::test]
async fn path_inside_a_flow_runs_the_whole_flow() {
    let mut project = Project::empty();
    project.flow("demo", DEMO);
    project.start();

    let job = project.run("demo/test/unit").await;
    assert_eq!(job.root.to_string(), "demo");
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.node_status("demo/build"), NodeStatus::Success);
    project.shutdown().await;
}

#[tokio::test]
async fn unknown_flow_or_node_is_rejected() {
    let mut project = Project::empty();
    project.flow("demo", DEMO);
    project.start();

    let missing = project.service().create_job("ghost").await.unwrap_err();
    assert!(
        matches!(missing, JobError::Definition(DefinitionError::FlowNotFound(_))),
        "{missing}"
    );
    let bad_node = project.service().create_job("demo/deploy").await.unwrap_err();
    assert!(matches!(bad_node, JobError::Definition(DefinitionError::Invalid(_))), "{bad_node}");
    assert!(project.service().list_jobs(None, &[]).is_empty());
    project.shutdown().await;
}

#[tokio::test]
async fn malformed_flow_file_is_rejected() {
    let mut project = Project::empty();
    project.flow("broken", "[[step]]\nname = 7\n");
    project.flow(
        "scripted_group",
        r#"
[[step]]
name = "group"
script = "true"

[[step.step]]
name = "inner"
script = "true"
"#,
    );
    project.start();

    let parse = project.service().create_job("broken").await.unwrap_err();
    assert!(matches!(parse, JobError::Definition(DefinitionError::Parse { .. })), "{parse}");
    let invalid = project.service().create_job("scripted_group").await.unwrap_err();
    assert!(
        matches!(invalid, JobError::Definition(DefinitionError::Invalid(_))),
        "{invalid}"
    );
    project.shutdown().await;
}

#[tokio::test]
async fn flow_without_steps_succeeds_immediately() {
    let mut project = Project::empty();
    project.flow("empty", "");
    project.start();

    let job = project.run("empty").await;
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(project.statuses("empty", 1), rows(&[("empty", NodeStatus::Success)]));
    project.shutdown().await;
}
