// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution agents.
//!
//! An agent takes a dispatched [`CmdQueueItem`] and reports how it ended.
//! Deadlines are enforced by the caller, so adapters must be cancel-safe:
//! dropping the `execute` future abandons the command.

use async_trait::async_trait;
use flow_core::{CmdQueueItem, CmdStatus};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("agent unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal report for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub status: CmdStatus,
    pub exit_code: Option<i32>,
    pub log_ref: Option<String>,
}

impl AgentReply {
    pub fn success() -> Self {
        Self { status: CmdStatus::Success, exit_code: Some(0), log_ref: None }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self { status: CmdStatus::Failure, exit_code: Some(exit_code), log_ref: None }
    }

    /// Callback item carrying this reply for `item`
    pub fn into_callback(self, item: &CmdQueueItem) -> CmdQueueItem {
        let reply = item.reply(self.status, self.exit_code);
        match self.log_ref {
            Some(log_ref) => reply.with_log_ref(log_ref),
            None => reply,
        }
    }
}

/// Adapter for executing commands
#[async_trait]
pub trait AgentAdapter: Clone + Send + Sync + 'static {
    /// Run the command to completion
    async fn execute(&self, item: &CmdQueueItem) -> Result<AgentReply, AgentError>;
}

/// Runs each command's script with `sh -c` on this host.
///
/// Output goes to `<log_dir>/<cmd_id>.log`, which becomes the reply's
/// `log_ref`. The child is killed when the future is dropped.
#[derive(Clone, Debug)]
pub struct ShellAgent {
    log_dir: PathBuf,
}

impl ShellAgent {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }
}

#[async_trait]
impl AgentAdapter for ShellAgent {
    async fn execute(&self, item: &CmdQueueItem) -> Result<AgentReply, AgentError> {
        tokio::fs::create_dir_all(&self.log_dir).await?;
        let log_path = self.log_dir.join(format!("{}.log", item.cmd_id));
        let log = std::fs::File::create(&log_path)?;
        let stderr = log.try_clone()?;

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&item.payload.script)
            .envs(&item.payload.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::SpawnFailed(e.to_string()))?;

        tracing::debug!(cmd_id = %item.cmd_id, node = %item.node_path, "spawned shell command");
        let status = child.wait().await?;
        let reply = match status.code() {
            Some(0) => AgentReply::success(),
            Some(code) => AgentReply::failure(code),
            // Terminated by a signal
            None => AgentReply { status: CmdStatus::Killed, exit_code: None, log_ref: None },
        };
        Ok(AgentReply { log_ref: Some(log_path.display().to_string()), ..reply })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AgentAdapter, AgentError, AgentReply};
    use async_trait::async_trait;
    use flow_core::CmdQueueItem;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeAgentState {
        calls: Vec<CmdQueueItem>,
        replies: HashMap<String, AgentReply>,
        errors: HashSet<String>,
        hung: HashSet<String>,
        held: HashSet<String>,
    }

    /// Fake agent for testing.
    ///
    /// Replies `Success` unless configured per node path. Held paths block
    /// until released; hung paths never return.
    #[derive(Clone, Default)]
    pub struct FakeAgentAdapter {
        inner: Arc<Mutex<FakeAgentState>>,
        released: Arc<Notify>,
    }

    impl FakeAgentAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_reply(&self, node_path: &str, reply: AgentReply) {
            self.inner.lock().replies.insert(node_path.to_string(), reply);
        }

        /// Make commands for `node_path` fail at the transport level
        pub fn set_error(&self, node_path: &str) {
            self.inner.lock().errors.insert(node_path.to_string());
        }

        /// Commands for `node_path` never complete
        pub fn hang(&self, node_path: &str) {
            self.inner.lock().hung.insert(node_path.to_string());
        }

        /// Commands for `node_path` wait until [`Self::release`]
        pub fn hold(&self, node_path: &str) {
            self.inner.lock().held.insert(node_path.to_string());
        }

        pub fn release(&self, node_path: &str) {
            self.inner.lock().held.remove(node_path);
            self.released.notify_waiters();
        }

        /// Every command received, in order
        pub fn calls(&self) -> Vec<CmdQueueItem> {
            self.inner.lock().calls.clone()
        }

        /// Node paths of every command received, in order
        pub fn executed_paths(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|c| c.node_path.to_string()).collect()
        }
    }

    #[async_trait]
    impl AgentAdapter for FakeAgentAdapter {
        async fn execute(&self, item: &CmdQueueItem) -> Result<AgentReply, AgentError> {
            let path = item.node_path.to_string();
            let hung = {
                let mut state = self.inner.lock();
                state.calls.push(item.clone());
                state.hung.contains(&path)
            };
            if hung {
                std::future::pending::<()>().await;
            }

            loop {
                let released = self.released.notified();
                tokio::pin!(released);
                released.as_mut().enable();
                if !self.inner.lock().held.contains(&path) {
                    break;
                }
                released.await;
            }

            let state = self.inner.lock();
            if state.errors.contains(&path) {
                return Err(AgentError::Unavailable(format!("injected error for {path}")));
            }
            Ok(state.replies.get(&path).cloned().unwrap_or_else(AgentReply::success))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgentAdapter;

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
