// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Join point between outbound commands and inbound callbacks.

use flow_core::{CmdId, CmdQueueItem, JobId, NodePath};
use parking_lot::Mutex;
use std::collections::HashMap;

/// The (job, node) a dispatched command belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub job_id: JobId,
    pub node_path: NodePath,
}

impl Correlation {
    fn matches(&self, item: &CmdQueueItem) -> bool {
        self.job_id == item.job_id && self.node_path == item.node_path
    }
}

/// Outstanding commands keyed by `cmd_id`.
///
/// Removal is a single check-and-remove under the table lock, so exactly
/// one of several concurrent deliveries of the same `cmd_id` wins.
#[derive(Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<CmdId, Correlation>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, item: &CmdQueueItem) {
        let correlation =
            Correlation { job_id: item.job_id, node_path: item.node_path.clone() };
        self.entries.lock().insert(item.cmd_id.clone(), correlation);
    }

    /// Remove and return the correlation for a terminal callback.
    ///
    /// `None` when the id is unknown, already taken, or the callback's
    /// job/node do not match what was dispatched (the entry is kept then).
    pub fn take(&self, item: &CmdQueueItem) -> Option<Correlation> {
        let mut entries = self.entries.lock();
        match entries.get(&item.cmd_id) {
            Some(c) if c.matches(item) => entries.remove(&item.cmd_id),
            Some(c) => {
                tracing::warn!(
                    cmd_id = %item.cmd_id,
                    expected_job = %c.job_id,
                    expected_node = %c.node_path,
                    job_id = %item.job_id,
                    node = %item.node_path,
                    "callback does not match dispatched command"
                );
                None
            }
            None => None,
        }
    }

    /// Look up without removing, for intermediate callbacks.
    pub fn peek(&self, item: &CmdQueueItem) -> Option<Correlation> {
        self.entries.lock().get(&item.cmd_id).filter(|c| c.matches(item)).cloned()
    }

    pub fn remove(&self, cmd_id: &CmdId) -> Option<Correlation> {
        self.entries.lock().remove(cmd_id)
    }

    /// Drop every entry of `job_id`. Returns how many were removed.
    pub fn purge_job(&self, job_id: JobId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, c| c.job_id != job_id);
        before - entries.len()
    }

    pub fn contains(&self, cmd_id: &CmdId) -> bool {
        self.entries.lock().contains_key(cmd_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
#[path = "correlation_tests.rs"]
mod tests;
