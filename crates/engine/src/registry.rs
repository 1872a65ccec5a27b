// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory index of jobs.
//!
//! Each job lives in its own [`JobSlot`]; the slot's lock serializes every
//! mutation of that job. The index lock only guards lookups and inserts and
//! is never held while a slot is locked.

use flow_core::{Job, JobId, NodeResult, NodeTree};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One job and the lock that serializes its mutations
pub type JobSlot = Arc<Mutex<Job>>;

#[derive(Default)]
struct RegistryIndex {
    jobs: HashMap<JobId, JobSlot>,
    by_number: HashMap<(String, u32), JobId>,
    /// Registration order, oldest first
    order: Vec<JobId>,
    last_build: HashMap<String, u32>,
    last_id: u64,
}

#[derive(Default)]
pub struct JobRegistry {
    index: Mutex<RegistryIndex>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and the flow's next build number, and register a new
    /// job for `tree` in one step.
    pub fn create(&self, tree: NodeTree, created_at_ms: u64) -> JobSlot {
        let mut index = self.index.lock();
        index.last_id += 1;
        let id = JobId(index.last_id);
        let build_number = {
            let last = index.last_build.entry(tree.flow().to_string()).or_insert(0);
            *last += 1;
            *last
        };
        let job = Job::new(id, build_number, tree, created_at_ms);
        Self::insert(&mut index, job)
    }

    /// Register an existing job record, e.g. one restored from a store.
    ///
    /// Build counters and id allocation move past it.
    pub fn register(&self, job: Job) -> JobSlot {
        let mut index = self.index.lock();
        index.last_id = index.last_id.max(job.id.0);
        let last = index.last_build.entry(job.flow.clone()).or_insert(0);
        *last = (*last).max(job.build_number);
        Self::insert(&mut index, job)
    }

    fn insert(index: &mut RegistryIndex, job: Job) -> JobSlot {
        let id = job.id;
        index.by_number.insert((job.flow.clone(), job.build_number), id);
        if !index.jobs.contains_key(&id) {
            index.order.push(id);
        }
        let slot = Arc::new(Mutex::new(job));
        index.jobs.insert(id, Arc::clone(&slot));
        slot
    }

    pub fn slot(&self, id: JobId) -> Option<JobSlot> {
        self.index.lock().jobs.get(&id).cloned()
    }

    pub fn slot_by_number(&self, flow: &str, build_number: u32) -> Option<JobSlot> {
        let index = self.index.lock();
        let id = index.by_number.get(&(flow.to_string(), build_number))?;
        index.jobs.get(id).cloned()
    }

    /// Snapshot of a job
    pub fn find(&self, id: JobId) -> Option<Job> {
        self.slot(id).map(|slot| slot.lock().clone())
    }

    pub fn find_by_number(&self, flow: &str, build_number: u32) -> Option<Job> {
        self.slot_by_number(flow, build_number).map(|slot| slot.lock().clone())
    }

    /// Jobs of the selected flows, most recent first.
    ///
    /// The selection is the union of `flow_path` and `flow_paths`; an empty
    /// selection lists every job.
    pub fn list(&self, flow_path: Option<&str>, flow_paths: &[String]) -> Vec<Job> {
        let mut wanted: Vec<&str> = flow_paths.iter().map(String::as_str).collect();
        wanted.extend(flow_path);
        let slots: Vec<JobSlot> = {
            let index = self.index.lock();
            index.order.iter().rev().filter_map(|id| index.jobs.get(id).cloned()).collect()
        };
        slots
            .into_iter()
            .map(|slot| slot.lock().clone())
            .filter(|job| wanted.is_empty() || wanted.contains(&job.flow.as_str()))
            .collect()
    }

    /// Node results of one build in tree pre-order
    pub fn list_node_results(&self, flow: &str, build_number: u32) -> Option<Vec<NodeResult>> {
        self.slot_by_number(flow, build_number).map(|slot| slot.lock().node_results())
    }

    /// Forget finished jobs of `flow` beyond the `keep` most recent ones.
    ///
    /// Running jobs are never evicted and build counters are untouched.
    /// Returns the number of jobs dropped.
    pub fn evict_finished(&self, flow: &str, keep: usize) -> usize {
        let candidates: Vec<(JobId, JobSlot)> = {
            let index = self.index.lock();
            index
                .order
                .iter()
                .rev()
                .filter_map(|id| index.jobs.get(id).map(|slot| (*id, Arc::clone(slot))))
                .collect()
        };
        let evicted: Vec<(JobId, u32)> = candidates
            .into_iter()
            .filter_map(|(id, slot)| {
                let job = slot.lock();
                (job.flow == flow && job.is_terminal()).then_some((id, job.build_number))
            })
            .skip(keep)
            .collect();
        if evicted.is_empty() {
            return 0;
        }

        let mut index = self.index.lock();
        for (id, build_number) in &evicted {
            index.jobs.remove(id);
            index.by_number.remove(&(flow.to_string(), *build_number));
        }
        let RegistryIndex { order, jobs, .. } = &mut *index;
        order.retain(|id| jobs.contains_key(id));
        tracing::debug!(flow, evicted = evicted.len(), "evicted finished jobs");
        evicted.len()
    }

    /// A job of `flow` that has not finished yet, if any
    pub fn running_for(&self, flow: &str) -> Option<Job> {
        let slots: Vec<JobSlot> = self.index.lock().jobs.values().cloned().collect();
        slots
            .into_iter()
            .filter_map(|slot| {
                let job = slot.lock();
                (job.flow == flow && !job.is_terminal()).then(|| job.clone())
            })
            .min_by_key(|job| job.build_number)
    }

    pub fn len(&self) -> usize {
        self.index.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().jobs.is_empty()
    }

    /// Forget every job. Build counters are kept so numbers never repeat.
    pub fn clear(&self) {
        let mut index = self.index.lock();
        index.jobs.clear();
        index.by_number.clear();
        index.order.clear();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
