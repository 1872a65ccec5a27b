// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flow-adapters: definition sources, execution agents and job stores

pub mod agent;
pub mod definition;
pub mod store;

pub use agent::{AgentAdapter, AgentError, AgentReply, ShellAgent};
pub use definition::{DefinitionError, DefinitionSource, MemoryDefinitions, TomlDefinitions};
pub use store::{FileJobStore, JobStore, StoreError, StoredJob};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use agent::FakeAgentAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use store::FakeJobStore;
