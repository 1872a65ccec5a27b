// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node execution decisions.
//!
//! The runner only looks at one node: it says how to start it and how a
//! command's reported status reads as a node status. Sequencing between
//! nodes belongs to the orchestrator.

use flow_core::{CmdPayload, CmdQueueItem, CmdStatus, Job, Node, NodeKind, NodePath, NodeStatus};

/// Variables every command receives on top of the node's environment
pub const ENV_JOB_ID: &str = "FLOW_JOB_ID";
pub const ENV_BUILD_NUMBER: &str = "FLOW_BUILD_NUMBER";
pub const ENV_NODE_PATH: &str = "FLOW_NODE_PATH";

/// How a node starts once it is marked running
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStart {
    /// Leaf step: hand this command to an agent and wait for its callback
    Dispatch(CmdQueueItem),
    /// Node with children: start the first child
    Descend(NodePath),
    /// Nothing to run; the node ends right away
    Finished(NodeStatus),
}

pub fn start_node(job: &Job, node: &Node) -> NodeStart {
    if let Some(first) = node.children.first() {
        return NodeStart::Descend(first.clone());
    }
    match &node.kind {
        NodeKind::Flow => NodeStart::Finished(NodeStatus::Success),
        NodeKind::Step { script: Some(script) } => {
            NodeStart::Dispatch(build_command(job, node, script))
        }
        NodeKind::Step { script: None } => {
            tracing::warn!(job_id = %job.id, node = %node.path, "step has nothing to run");
            NodeStart::Finished(NodeStatus::Failure)
        }
    }
}

/// Command for a leaf step, with the inherited environment and timeout.
pub fn build_command(job: &Job, node: &Node, script: &str) -> CmdQueueItem {
    let mut env = job.tree.effective_env(&node.path);
    env.insert(ENV_JOB_ID.to_string(), job.id.to_string());
    env.insert(ENV_BUILD_NUMBER.to_string(), job.build_number.to_string());
    env.insert(ENV_NODE_PATH.to_string(), node.path.to_string());

    let payload = CmdPayload {
        script: script.to_string(),
        env,
        timeout_secs: job.tree.effective_timeout_secs(&node.path),
    };
    CmdQueueItem::new(job.id, node.path.clone(), payload)
}

/// Node status for a command status; `None` while the command is in flight.
pub fn interpret(status: CmdStatus) -> Option<NodeStatus> {
    status.node_status()
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
