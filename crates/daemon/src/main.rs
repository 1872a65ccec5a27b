// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! flowd: run flows from `FLOW_FLOWS_DIR` to completion.
//!
//! Usage: `flowd <flow>...`. Each flow becomes one job; the process exits
//! non-zero unless every job succeeds. Ctrl-C stops the running jobs.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use flow_adapters::{FileJobStore, ShellAgent, TomlDefinitions};
use flow_core::{Job, JobStatus};
use flow_daemon::{logging, Config, Daemon, LifecycleError};
use tracing::error;

const POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> ExitCode {
    let flows: Vec<String> = std::env::args().skip(1).collect();
    if flows.is_empty() {
        eprintln!("usage: flowd <flow>...");
        return ExitCode::from(2);
    }

    match run(&flows).await {
        Ok((jobs, rejected)) => {
            for job in &jobs {
                println!("{} #{} {}", job.flow, job.build_number, job.status);
            }
            if rejected == 0 && jobs.iter().all(|j| j.status == JobStatus::Success) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("flowd: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Finished jobs, plus how many flows could not be started
async fn run(flows: &[String]) -> Result<(Vec<Job>, usize), LifecycleError> {
    let config = Config::load()?;
    let _log_guard = logging::init(&config)?;

    let definitions = Arc::new(TomlDefinitions::new(&config.flows_dir));
    let store = FileJobStore::new(&config.state_dir);
    let agent = ShellAgent::new(&config.logs_path);
    let daemon = Daemon::start(config, definitions, store, agent)?;

    let mut started = Vec::new();
    let mut rejected = 0;
    for flow in flows {
        match daemon.service().create_job(flow).await {
            Ok(job) => started.push(job),
            Err(e) => {
                eprintln!("{flow}: {e}");
                rejected += 1;
            }
        }
    }

    let mut finished = Vec::new();
    for job in started {
        let outcome = tokio::select! {
            outcome = daemon.wait_finished(job.id, POLL) => outcome,
            _ = tokio::signal::ctrl_c() => {
                for job in daemon.service().list_jobs(None, &[]) {
                    let _ = daemon.service().stop_job(&job.flow, job.build_number).await;
                }
                daemon.wait_finished(job.id, POLL).await
            }
        };
        match outcome {
            Ok(job) => finished.push(job),
            Err(e) => error!(job_id = %job.id, error = %e, "lost track of job"),
        }
    }

    daemon.shutdown().await;
    Ok((finished, rejected))
}
