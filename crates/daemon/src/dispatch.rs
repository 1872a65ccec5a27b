// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport between the command queue and an execution agent.
//!
//! The dispatcher drains the queue, hands each command to the agent under a
//! deadline and feeds the agent's report back through `callback`.

use std::sync::Arc;
use std::time::Duration;

use flow_adapters::AgentAdapter;
use flow_core::{Clock, CmdQueueItem, CmdStatus};
use flow_engine::{CallbackOutcome, JobService};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Dispatcher<A: AgentAdapter, C: Clock> {
    service: Arc<JobService<C>>,
    agent: A,
    /// Deadline for commands whose node sets none
    default_timeout: Duration,
    in_flight: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl<A: AgentAdapter, C: Clock> Dispatcher<A, C> {
    pub fn new(
        service: Arc<JobService<C>>,
        agent: A,
        default_timeout: Duration,
        max_in_flight: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            agent,
            default_timeout,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dequeue and execute commands until cancelled or the queue closes.
    ///
    /// Commands still executing when cancelled are abandoned without a
    /// callback.
    pub async fn run(self) {
        let mut tasks = JoinSet::new();
        loop {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&self.in_flight).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let item = tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = self.service.queue().dequeue() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            tasks.spawn(self.clone().execute(item, permit));

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "command task failed");
                }
            }
        }

        tracing::debug!(in_flight = tasks.len(), "dispatcher stopping");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "command task failed");
            }
        }
        tracing::info!("dispatcher stopped");
    }

    async fn execute(self, item: CmdQueueItem, permit: OwnedSemaphorePermit) {
        let started = self.service.callback(item.reply(CmdStatus::Running, None)).await;
        if let CallbackOutcome::Discarded(reason) = started {
            tracing::debug!(cmd_id = %item.cmd_id, %reason, "command withdrawn, not executing");
            return;
        }

        let deadline =
            item.payload.timeout_secs.map(Duration::from_secs).unwrap_or(self.default_timeout);
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::info!(cmd_id = %item.cmd_id, node = %item.node_path, "command abandoned");
                return;
            }
            result = tokio::time::timeout(deadline, self.agent.execute(&item)) => result,
        };

        let reply = match result {
            Ok(Ok(reply)) => reply.into_callback(&item),
            Ok(Err(e)) => {
                tracing::warn!(
                    cmd_id = %item.cmd_id,
                    node = %item.node_path,
                    error = %e,
                    "agent failed"
                );
                item.reply(CmdStatus::Failure, None)
            }
            Err(_) => {
                tracing::warn!(
                    cmd_id = %item.cmd_id,
                    node = %item.node_path,
                    deadline_ms = deadline.as_millis() as u64,
                    "command timed out"
                );
                item.reply(CmdStatus::Timeout, None)
            }
        };

        // The callback may wait for queue space; free the slot first so the
        // loop keeps draining.
        drop(permit);
        let outcome = self.service.callback(reply).await;
        tracing::debug!(cmd_id = %item.cmd_id, ?outcome, "command reported");
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
