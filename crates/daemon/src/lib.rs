// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow daemon library
//!
//! Wires the job service to an execution agent and manages its lifetime.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatch;
pub mod env;
pub mod lifecycle;
pub mod logging;

pub use dispatch::Dispatcher;
pub use lifecycle::{Config, Daemon, DaemonService, LifecycleError};
