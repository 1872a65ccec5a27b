// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::queue::QueueError;
use flow_adapters::DefinitionError;
use flow_core::JobId;
use thiserror::Error;

/// Errors returned to callers of the job service
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid flow path: {0}")]
    Definition(#[from] DefinitionError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("flow {flow} already has build #{build_number} running ({job_id})")]
    Conflict { flow: String, build_number: u32, job_id: JobId },
    #[error("command queue is closed")]
    QueueClosed,
}

impl From<QueueError> for JobError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed => JobError::QueueClosed,
        }
    }
}

impl JobError {
    pub(crate) fn job_not_found(id: JobId) -> Self {
        JobError::NotFound(format!("job {id}"))
    }

    pub(crate) fn build_not_found(flow: &str, build_number: u32) -> Self {
        JobError::NotFound(format!("{flow} #{build_number}"))
    }
}
