// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the orchestrator needs performed
//!
//! Job state transitions are computed under the job's lock and only return
//! effects; the caller executes them once the lock is released.

use crate::command::CmdQueueItem;
use crate::job::{Job, JobId, NodeResult};
use serde::{Deserialize, Serialize};

/// Effects that need to be executed after a job transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    // === Dispatch ===
    /// Register the command's correlation, then enqueue it for an agent
    Dispatch { item: CmdQueueItem },

    /// Drop the job's commands that no agent has dequeued yet
    CancelQueued { job_id: JobId },

    /// Forget every outstanding correlation of the job
    PurgeCorrelations { job_id: JobId },

    // === Persistence (write-behind) ===
    SaveJob { job: Box<Job> },

    SaveNodeResult { job_id: JobId, result: NodeResult },
}

impl Effect {
    /// Effect name for log spans
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Dispatch { .. } => "dispatch",
            Effect::CancelQueued { .. } => "cancel_queued",
            Effect::PurgeCorrelations { .. } => "purge_correlations",
            Effect::SaveJob { .. } => "save_job",
            Effect::SaveNodeResult { .. } => "save_node_result",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Dispatch { item } => vec![
                ("cmd_id", item.cmd_id.to_string()),
                ("job_id", item.job_id.to_string()),
                ("node", item.node_path.to_string()),
            ],
            Effect::CancelQueued { job_id } | Effect::PurgeCorrelations { job_id } => {
                vec![("job_id", job_id.to_string())]
            }
            Effect::SaveJob { job } => {
                vec![("job_id", job.id.to_string()), ("status", job.status.to_string())]
            }
            Effect::SaveNodeResult { job_id, result } => vec![
                ("job_id", job_id.to_string()),
                ("node", result.path.to_string()),
                ("status", result.status.to_string()),
            ],
        }
    }

    /// Whether to log at info level. Persistence fires on every transition.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::SaveJob { .. } | Effect::SaveNodeResult { .. })
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
