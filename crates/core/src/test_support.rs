// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::node::{NodeDef, NodeTree};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for the status state machines.
pub mod strategies {
    use crate::command::CmdStatus;
    use crate::job::{JobStatus, NodeStatus};
    use proptest::prelude::*;

    pub fn arb_node_status() -> impl Strategy<Value = NodeStatus> {
        prop_oneof![
            Just(NodeStatus::Pending),
            Just(NodeStatus::Running),
            Just(NodeStatus::Success),
            Just(NodeStatus::Failure),
            Just(NodeStatus::Timeout),
            Just(NodeStatus::Skipped),
            Just(NodeStatus::Stopped),
        ]
    }

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Created),
            Just(JobStatus::Running),
            Just(JobStatus::Success),
            Just(JobStatus::Failure),
            Just(JobStatus::Timeout),
            Just(JobStatus::Stopped),
        ]
    }

    pub fn arb_cmd_status() -> impl Strategy<Value = CmdStatus> {
        prop_oneof![
            Just(CmdStatus::Sent),
            Just(CmdStatus::Running),
            Just(CmdStatus::Success),
            Just(CmdStatus::Failure),
            Just(CmdStatus::Timeout),
            Just(CmdStatus::Killed),
        ]
    }

    /// Terminal outcomes an agent can report
    pub fn arb_terminal_cmd_status() -> impl Strategy<Value = CmdStatus> {
        prop_oneof![
            Just(CmdStatus::Success),
            Just(CmdStatus::Failure),
            Just(CmdStatus::Timeout),
            Just(CmdStatus::Killed),
        ]
    }
}

// ── Tree factories ──────────────────────────────────────────────────────

/// Flow `name` with one step per entry of `steps`, each running `echo <step>`.
pub fn flow_def(name: &str, steps: &[&str]) -> NodeDef {
    steps.iter().fold(NodeDef::flow(name), |def, step| {
        def.with_step(NodeDef::step(*step, format!("echo {step}")))
    })
}

/// Built tree for [`flow_def`]. Panics on invalid names (tests only).
#[allow(clippy::expect_used)]
pub fn flow_tree(name: &str, steps: &[&str], allow_failure: bool) -> NodeTree {
    NodeTree::build(&flow_def(name, steps).allow_failure(allow_failure))
        .expect("test flow definition is valid")
}
