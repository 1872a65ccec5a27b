// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and the job/node state machines.

use crate::command::CmdId;
use crate::node::{NodePath, NodeTree};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a job.
///
/// `Created → Running → {Success, Failure, Timeout, Stopped}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Running,
    Success,
    Failure,
    Timeout,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Created | JobStatus::Running)
    }
}

crate::simple_display! {
    JobStatus {
        Created => "created",
        Running => "running",
        Success => "success",
        Failure => "failure",
        Timeout => "timeout",
        Stopped => "stopped",
    }
}

/// Status of one node within a job.
///
/// `Pending → Running → {Success, Failure, Timeout, Skipped, Stopped}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Timeout,
    /// Not run because an earlier sibling failed
    Skipped,
    /// Stopped by request while pending or running
    Stopped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeStatus::Pending | NodeStatus::Running)
    }

    /// Failures that short-circuit the remaining siblings
    pub fn is_failure(self) -> bool {
        matches!(self, NodeStatus::Failure | NodeStatus::Timeout)
    }

    /// Job status taken when the root node ends with this status.
    pub fn job_status(self) -> Option<JobStatus> {
        match self {
            NodeStatus::Pending | NodeStatus::Running => None,
            NodeStatus::Success | NodeStatus::Skipped => Some(JobStatus::Success),
            NodeStatus::Failure => Some(JobStatus::Failure),
            NodeStatus::Timeout => Some(JobStatus::Timeout),
            NodeStatus::Stopped => Some(JobStatus::Stopped),
        }
    }
}

crate::simple_display! {
    NodeStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failure => "failure",
        Timeout => "timeout",
        Skipped => "skipped",
        Stopped => "stopped",
    }
}

/// Recorded outcome of one node within one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResult {
    pub path: NodePath,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_ref: Option<String>,
    /// Command that executed this node (steps only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_id: Option<CmdId>,
}

impl NodeResult {
    pub fn pending(path: NodePath) -> Self {
        Self {
            path,
            status: NodeStatus::Pending,
            started_at_ms: None,
            finished_at_ms: None,
            exit_code: None,
            log_ref: None,
            cmd_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move a pending node to running. Returns false if it was not pending.
    pub fn start(&mut self, epoch_ms: u64) -> bool {
        if self.status != NodeStatus::Pending {
            return false;
        }
        self.status = NodeStatus::Running;
        self.started_at_ms = Some(epoch_ms);
        true
    }

    /// Record a terminal status. Terminal statuses are write-once: returns
    /// false and leaves the result untouched if it already finished.
    pub fn finish(&mut self, status: NodeStatus, epoch_ms: u64) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at_ms = Some(epoch_ms);
        true
    }

    pub fn duration_ms(&self) -> Option<u64> {
        Some(self.finished_at_ms?.saturating_sub(self.started_at_ms?))
    }
}

crate::builder! {
    pub struct NodeResultBuilder => NodeResult {
        into {
            path: NodePath = "demo/step",
        }
        set {
            status: NodeStatus = NodeStatus::Running,
        }
        option {
            started_at_ms: u64,
            finished_at_ms: u64,
            exit_code: i32,
            log_ref: String,
            cmd_id: CmdId,
        }
    }
}

/// One execution of a flow at a specific build number.
///
/// Owns its node results in a map keyed by node path; results never refer
/// back to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub flow: String,
    pub build_number: u32,
    pub status: JobStatus,
    /// Node the job executes; the flow root
    pub root: NodePath,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    pub tree: NodeTree,
    #[serde(default)]
    pub results: HashMap<NodePath, NodeResult>,
}

impl Job {
    pub fn new(id: JobId, build_number: u32, tree: NodeTree, created_at_ms: u64) -> Self {
        Self {
            id,
            flow: tree.flow().to_string(),
            build_number,
            status: JobStatus::Created,
            root: tree.root_path().clone(),
            created_at_ms,
            finished_at_ms: None,
            tree,
            results: HashMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn result(&self, path: &str) -> Option<&NodeResult> {
        self.results.get(path)
    }

    /// Status of a node, `Pending` if it has not been scheduled yet.
    pub fn node_status(&self, path: &str) -> NodeStatus {
        self.result(path).map(|r| r.status).unwrap_or_default()
    }

    /// Result for `path`, created as pending on first access.
    pub fn result_mut(&mut self, path: &NodePath) -> &mut NodeResult {
        self.results.entry(path.clone()).or_insert_with(|| NodeResult::pending(path.clone()))
    }

    /// Results of every scheduled node, in tree pre-order.
    pub fn node_results(&self) -> Vec<NodeResult> {
        self.tree.pre_order().filter_map(|n| self.results.get(&n.path)).cloned().collect()
    }

    /// Enter a terminal status. Write-once like node results.
    pub fn finish(&mut self, status: JobStatus, epoch_ms: u64) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at_ms = Some(epoch_ms);
        true
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
