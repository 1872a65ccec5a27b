// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flow-engine: job orchestration, the command queue and callback handling

pub mod config;
pub mod correlation;
pub mod error;
mod executor;
pub mod orchestrator;
pub mod persist;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod service;

pub use config::{EngineConfig, RetryPolicy, DEFAULT_FINISHED_JOBS_KEPT};
pub use correlation::{Correlation, CorrelationTable};
pub use error::JobError;
pub use orchestrator::{CallbackOutcome, DiscardReason, JobOrchestrator};
pub use persist::Persister;
pub use queue::{CommandQueue, QueueError};
pub use registry::{JobRegistry, JobSlot};
pub use runner::NodeStart;
pub use service::JobService;
