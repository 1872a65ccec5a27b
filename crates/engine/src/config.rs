// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Retry schedule for write-behind saves.
///
/// Attempt `n` (0-based) waits `initial_backoff * 2^(n-1)` before retrying,
/// capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self { max_attempts, initial_backoff, ..Self::default() }
    }

    /// Delay before retry number `retry` (1 for the first retry)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

pub const DEFAULT_FINISHED_JOBS_KEPT: usize = 100;

/// Tunables for the orchestration engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Commands the queue holds before `enqueue` waits
    pub queue_capacity: usize,
    /// Whether a flow may have more than one job running at once
    pub allow_concurrent_builds: bool,
    pub persist_retry: RetryPolicy,
    /// Finished jobs kept in memory per flow; `None` keeps them all
    pub finished_jobs_kept: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            allow_concurrent_builds: true,
            persist_retry: RetryPolicy::default(),
            finished_jobs_kept: Some(DEFAULT_FINISHED_JOBS_KEPT),
        }
    }
}

impl EngineConfig {
    flow_core::setters! {
        set {
            queue_capacity: usize,
            allow_concurrent_builds: bool,
            persist_retry: RetryPolicy,
        }
        option {
            finished_jobs_kept: usize,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
