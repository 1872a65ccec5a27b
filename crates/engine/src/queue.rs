// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded outbound queue of commands awaiting an agent.
//!
//! One queue is shared by every job. Items leave in FIFO order; `enqueue`
//! waits while the queue is full, which is the backpressure point between
//! orchestration and agent throughput.

use flow_core::{CmdQueueItem, JobId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("command queue is closed")]
    Closed,
}

pub struct CommandQueue {
    items: Mutex<VecDeque<CmdQueueItem>>,
    /// One permit per free slot
    slots: Semaphore,
    available: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            items: Mutex::new(VecDeque::new()),
            slots: Semaphore::new(capacity),
            available: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Append `item`, waiting for a free slot. Fails once the queue is closed.
    pub async fn enqueue(&self, item: CmdQueueItem) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        let permit = self.slots.acquire().await.map_err(|_| QueueError::Closed)?;
        permit.forget();

        {
            let mut items = self.items.lock();
            if self.is_closed() {
                drop(items);
                self.slots.add_permits(1);
                return Err(QueueError::Closed);
            }
            items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<CmdQueueItem> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    pub fn try_dequeue(&self) -> Option<CmdQueueItem> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.slots.add_permits(1);
        }
        item
    }

    /// Remove every not-yet-dequeued item of `job_id`. Returns how many.
    pub fn cancel(&self, job_id: JobId) -> usize {
        let removed = {
            let mut items = self.items.lock();
            let before = items.len();
            items.retain(|item| item.job_id != job_id);
            before - items.len()
        };
        if removed > 0 {
            self.slots.add_permits(removed);
            tracing::debug!(%job_id, removed, "cancelled queued commands");
        }
        removed
    }

    /// Reject further enqueues and wake every waiter. Queued items can
    /// still be drained.
    pub fn close(&self) {
        {
            let _items = self.items.lock();
            self.closed.store(true, Ordering::SeqCst);
        }
        self.slots.close();
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of queued items, oldest first
    pub fn pending(&self) -> Vec<CmdQueueItem> {
        self.items.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
