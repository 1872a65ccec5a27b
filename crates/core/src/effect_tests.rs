// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::command::CmdPayload;
use crate::job::NodeStatus;
use crate::node::NodePath;
use crate::test_support::flow_tree;

fn dispatch() -> Effect {
    Effect::Dispatch {
        item: CmdQueueItem::new(JobId(4), NodePath::from("demo/a"), CmdPayload::default()),
    }
}

fn save_job() -> Effect {
    let job = Job::new(JobId(4), 2, flow_tree("demo", &["a"], false), 0);
    Effect::SaveJob { job: Box::new(job) }
}

fn save_result() -> Effect {
    let mut result = NodeResult::pending(NodePath::from("demo/a"));
    result.finish(NodeStatus::Skipped, 5);
    Effect::SaveNodeResult { job_id: JobId(4), result }
}

#[yare::parameterized(
    dispatch    = { super::dispatch(), "dispatch", true },
    cancel      = { Effect::CancelQueued { job_id: JobId(4) }, "cancel_queued", true },
    purge       = { Effect::PurgeCorrelations { job_id: JobId(4) }, "purge_correlations", true },
    save_job    = { super::save_job(), "save_job", false },
    save_result = { super::save_result(), "save_node_result", false },
)]
fn effect_name_and_verbosity(effect: Effect, name: &str, verbose: bool) {
    assert_eq!(effect.name(), name);
    assert_eq!(effect.verbose(), verbose);
}

#[test]
fn fields_always_carry_job_id() {
    for effect in [dispatch(), save_job(), save_result(), Effect::CancelQueued { job_id: JobId(4) }]
    {
        let fields = effect.fields();
        assert!(fields.contains(&("job_id", "4".to_string())), "{fields:?}");
    }
}

#[test]
fn node_result_fields_name_the_node() {
    let fields = save_result().fields();
    assert!(fields.contains(&("node", "demo/a".to_string())));
    assert!(fields.contains(&("status", "skipped".to_string())));
}
