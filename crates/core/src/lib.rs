// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flow-core: data model shared by the flow orchestration crates

pub mod macros;

pub mod clock;
pub mod command;
pub mod effect;
pub mod id;
pub mod job;
pub mod node;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{CmdId, CmdPayload, CmdQueueItem, CmdStatus};
pub use effect::Effect;
#[cfg(any(test, feature = "test-support"))]
pub use job::NodeResultBuilder;
pub use job::{Job, JobId, JobStatus, NodeResult, NodeStatus};
pub use node::{Node, NodeDef, NodeKind, NodePath, NodeTree, TreeError, PATH_SEPARATOR};
