// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flow_engine::{EngineConfig, RetryPolicy, DEFAULT_FINISHED_JOBS_KEPT};

use crate::lifecycle::LifecycleError;

/// Resolve state directory: FLOW_STATE_DIR > XDG_STATE_HOME/flow > ~/.local/state/flow
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("FLOW_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("flow"));
    }
    let home = non_empty("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/flow"))
}

/// Directory of `<flow>.toml` definitions (default `<state_dir>/flows`)
pub fn flows_dir() -> Option<PathBuf> {
    non_empty("FLOW_FLOWS_DIR").map(PathBuf::from)
}

/// Directory for the daemon log file. Logs go to stderr when unset.
pub fn log_dir() -> Option<PathBuf> {
    non_empty("FLOW_LOG_DIR").map(PathBuf::from)
}

/// `EnvFilter` directives (default `info`)
pub fn log_filter() -> String {
    non_empty("FLOW_LOG").unwrap_or_else(|| "info".to_string())
}

pub fn queue_capacity() -> usize {
    parse("FLOW_QUEUE_CAPACITY").unwrap_or(EngineConfig::default().queue_capacity)
}

/// Finished jobs kept in memory per flow; `unlimited` keeps them all
pub fn finished_jobs_kept() -> Option<usize> {
    match non_empty("FLOW_FINISHED_JOBS_KEPT").as_deref() {
        Some("unlimited") => None,
        _ => Some(parse("FLOW_FINISHED_JOBS_KEPT").unwrap_or(DEFAULT_FINISHED_JOBS_KEPT)),
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`
pub fn allow_concurrent_builds() -> bool {
    non_empty("FLOW_ALLOW_CONCURRENT_BUILDS")
        .and_then(|s| parse_bool(&s))
        .unwrap_or(EngineConfig::default().allow_concurrent_builds)
}

/// Deadline for commands whose node sets no `timeout_secs` (default 1h)
pub fn agent_timeout() -> Duration {
    parse("FLOW_AGENT_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(Duration::from_secs(3600))
}

/// Commands executing at once (default 16)
pub fn max_in_flight() -> usize {
    parse("FLOW_MAX_IN_FLIGHT").filter(|n| *n > 0).unwrap_or(16)
}

pub fn persist_retry() -> RetryPolicy {
    let default = RetryPolicy::default();
    let attempts = parse("FLOW_PERSIST_RETRIES").unwrap_or(default.max_attempts);
    let backoff = parse("FLOW_PERSIST_BACKOFF_MS")
        .map(Duration::from_millis)
        .unwrap_or(default.initial_backoff);
    RetryPolicy::new(attempts, backoff)
}

/// Shutdown drain timeout (default 5s, configurable via `FLOW_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    parse("FLOW_DRAIN_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(Duration::from_secs(5))
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Unparseable values fall back to the default, with a warning.
fn parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = non_empty(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring invalid value");
            None
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
