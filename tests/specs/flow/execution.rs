//! Flow execution specs
//!
//! Verify steps run in order through the shell agent and that outcomes
//! propagate to parents and the job.

use crate::prelude::*;
use crate::prelude::assert_eq;

const TWO_STEPS: &str = r#"
[[step]]
name = "a"
script = "true"

[[step]]
name = "b"
script = "true"
"#;

const FAILING_FIRST: &str = r#"
[[step]]
name = "a"
script = "echo broken >&2; exit 3"

[[step]]
name = "b"
script = "true"
"#;

const LENIENT: &str = r#"
allow_failure = true

[[step]]
name = "a"
script = "exit 1"

[[step]]
name = "b"
script = "true"
"#;

#[tokio::test]
async fn two_successful_steps() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    project.start();

    let job = project.run("demo").await;
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.build_number, 1);
    assert_eq!(
        project.statuses("demo", 1),
        rows(&[
            ("demo", NodeStatus::Success),
            ("demo/a", NodeStatus::Success),
            ("demo/b", NodeStatus::Success),
        ])
    );
    project.shutdown().await;
}

#[tokio::test]
async fn failing_step_skips_the_rest() {
    let mut project = Project::empty();
    project.flow("demo", FAILING_FIRST);
    project.start();

    let job = project.run("demo").await;
    assert_eq!(job.status, JobStatus::Failure);
    assert_eq!(
        project.statuses("demo", 1),
        rows(&[
            ("demo", NodeStatus::Failure),
            ("demo/a", NodeStatus::Failure),
            ("demo/b", NodeStatus::Skipped),
        ])
    );

    let a = job.result("demo/a").unwrap();
    assert_eq!(a.exit_code, Some(3));
    let log = std::fs::read_to_string(a.log_ref.as_deref().unwrap()).unwrap();
    assert!(log.contains("broken"), "log should capture stderr: {log}");
    project.shutdown().await;
}

#[tokio::test]
async fn allowed_failure_continues_and_succeeds() {
    let mut project = Project::empty();
    project.flow("lenient", LENIENT);
    project.start();

    let job = project.run("lenient").await;
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(
        project.statuses("lenient", 1),
        rows(&[
            ("lenient", NodeStatus::Success),
            ("lenient/a", NodeStatus::Failure),
            ("lenient/b", NodeStatus::Success),
        ])
    );
    project.shutdown().await;
}

#[tokio::test]
async fn step_killed_by_a_signal_fails_the_job() {
    let mut project = Project::empty();
    let crashing = FAILING_FIRST.replace("echo broken >&2; exit 3", "kill -KILL $$");
    project.flow("crash", &crashing);
    project.start();

    let job = project.run("crash").await;
    assert_eq!(job.status, JobStatus::Failure);
    assert_eq!(
        project.statuses("crash", 1),
        rows(&[
            ("crash", NodeStatus::Failure),
            ("crash/a", NodeStatus::Failure),
            ("crash/b", NodeStatus::Skipped),
        ])
    );
    project.shutdown().await;
}

#[tokio::test]
async fn nested_groups_run_depth_first() {
    let mut project = Project::empty();
    project.flow(
        "nested",
        r#"
[[step]]
name = "build"
script = "echo build >> $OUT"

[[step]]
name = "test"

[[step.step]]
name = "unit"
script = "echo unit >> $OUT"

[[step.step]]
name = "lint"
script = "echo lint >> $OUT"

[[step]]
name = "ship"
script = "echo ship >> $OUT"
"#
        .replace("$OUT", &project.path().join("order.log").display().to_string())
        .as_str(),
    );
    project.start();

    let job = project.run("nested").await;
    assert_eq!(job.status, JobStatus::Success);
    let order = std::fs::read_to_string(project.path().join("order.log")).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), vec!["build", "unit", "lint", "ship"]);
    assert_eq!(job.node_status("nested/test"), NodeStatus::Success);
    project.shutdown().await;
}

#[tokio::test]
async fn commands_inherit_environment() {
    let mut project = Project::empty();
    project.flow(
        "envy",
        r#"
[env]
STAGE = "ci"
REGION = "eu"

[[step]]
name = "group"
env = { REGION = "us" }

[[step.step]]
name = "check"
script = '''
set -e
test "$STAGE/$REGION" = ci/us
test "$FLOW_NODE_PATH" = envy/group/check
test "$FLOW_BUILD_NUMBER" = 1
'''
"#,
    );
    project.start();

    let job = project.run("envy").await;
    assert_eq!(job.node_status("envy/group/check"), NodeStatus::Success);
    project.shutdown().await;
}

#[tokio::test]
async fn step_deadline_times_out_the_job() {
    let mut project = Project::empty();
    project.flow(
        "slow",
        r#"
[[step]]
name = "wait"
timeout_secs = 1
script = "sleep 30"

[[step]]
name = "after"
script = "true"
"#,
    );
    project.start();

    let job = project.run("slow").await;
    assert_eq!(job.status, JobStatus::Timeout);
    assert_eq!(
        project.statuses("slow", 1),
        rows(&[
            ("slow", NodeStatus::Timeout),
            ("slow/wait", NodeStatus::Timeout),
            ("slow/after", NodeStatus::Skipped),
        ])
    );
    project.shutdown().await;
}

#[tokio::test]
async fn finished_jobs_are_persisted() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    project.start();

    let job = project.run("demo").await;
    project.shutdown().await;

    let stored = project.store().load_job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.job.status, JobStatus::Success);
    let transitions: Vec<(String, NodeStatus)> = project
        .store()
        .load_node_results(job.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.path.to_string(), r.status))
        .collect();
    assert_eq!(
        transitions,
        rows(&[
            ("demo", NodeStatus::Running),
            ("demo/a", NodeStatus::Running),
            ("demo/a", NodeStatus::Success),
            ("demo/b", NodeStatus::Running),
            ("demo/b", NodeStatus::Success),
            ("demo", NodeStatus::Success),
        ])
    );
}

#[tokio::test]
async fn builds_are_numbered_per_flow() {
    let mut project = Project::empty();
    project.flow("demo", TWO_STEPS);
    project.flow("other", TWO_STEPS);
    project.start();

    project.run("demo").await;
    project.run("other").await;
    project.run("demo").await;

    let listed: Vec<(String, u32)> = project
        .service()
        .list_jobs(None, &[])
        .into_iter()
        .map(|j| (j.flow, j.build_number))
        .collect();
    assert_eq!(
        listed,
        vec![("demo".to_string(), 2), ("other".to_string(), 1), ("demo".to_string(), 1)]
    );
    assert_eq!(project.service().list_jobs(Some("other"), &[]).len(), 1);
    project.shutdown().await;
}
