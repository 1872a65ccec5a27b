// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands exchanged with execution agents.
//!
//! A [`CmdQueueItem`] is created when a step is dispatched and comes back
//! through the callback carrying the same `cmd_id`, `job_id` and
//! `node_path`. Those three fields are the whole correlation key.

use crate::job::{JobId, NodeStatus};
use crate::node::NodePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Globally unique identifier of one dispatched command.
    pub struct CmdId("cmd-");
}

/// Lifecycle of a command as reported by the agent transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CmdStatus {
    /// Enqueued or handed to the transport
    Sent,
    /// Acknowledged by an agent and executing
    Running,
    Success,
    Failure,
    Timeout,
    /// Killed on the agent side (signal, OOM). Counts as a failure.
    Killed,
}

impl CmdStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CmdStatus::Sent | CmdStatus::Running)
    }

    /// Node status a terminal command status resolves to.
    pub fn node_status(self) -> Option<NodeStatus> {
        match self {
            CmdStatus::Sent | CmdStatus::Running => None,
            CmdStatus::Success => Some(NodeStatus::Success),
            CmdStatus::Failure => Some(NodeStatus::Failure),
            CmdStatus::Timeout => Some(NodeStatus::Timeout),
            CmdStatus::Killed => Some(NodeStatus::Failure),
        }
    }
}

crate::simple_display! {
    CmdStatus {
        Sent => "sent",
        Running => "running",
        Success => "success",
        Failure => "failure",
        Timeout => "timeout",
        Killed => "killed",
    }
}

/// What the agent should execute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdPayload {
    pub script: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Deadline for the agent, if the node or an ancestor sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// A unit of work in flight between the orchestrator and an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdQueueItem {
    pub cmd_id: CmdId,
    pub job_id: JobId,
    pub node_path: NodePath,
    pub payload: CmdPayload,
    pub status: CmdStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Opaque pointer to the command's output, owned by the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_ref: Option<String>,
}

impl CmdQueueItem {
    /// A freshly dispatched command with a new `cmd_id`
    pub fn new(job_id: JobId, node_path: NodePath, payload: CmdPayload) -> Self {
        Self {
            cmd_id: CmdId::new(),
            job_id,
            node_path,
            payload,
            status: CmdStatus::Sent,
            exit_code: None,
            log_ref: None,
        }
    }

    /// Copy of this item carrying an agent's report, for use as a callback.
    pub fn reply(&self, status: CmdStatus, exit_code: Option<i32>) -> Self {
        Self { status, exit_code, ..self.clone() }
    }

    pub fn with_log_ref(mut self, log_ref: impl Into<String>) -> Self {
        self.log_ref = Some(log_ref.into());
        self
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
