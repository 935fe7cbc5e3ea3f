//! Side-effect dispatch contract.
//!
//! # Responsibility
//! - Describe follow-up jobs (notifications) handed to an external queue.
//! - Provide in-process dispatchers for logging-only setups and tests.
//!
//! # Invariants
//! - The workflow engine never inspects a dispatch result beyond logging it.
//! - Retry and backoff are executed by the queue, not by this crate; the
//!   options only travel with the job.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

/// Retry delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
}

/// One job handed to the external queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub queue_name: String,
    pub job_name: String,
    pub payload: Value,
    pub options: JobOptions,
}

/// Dispatch failure reported by a queue collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub job_name: String,
    pub message: String,
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "dispatch of `{}` failed: {}", self.job_name, self.message)
    }
}

impl Error for DispatchError {}

/// Sink for best-effort follow-up jobs.
pub trait JobDispatcher {
    fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError>;
}

impl<T: JobDispatcher + ?Sized> JobDispatcher for &T {
    fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        (**self).dispatch(job)
    }
}

impl<T: JobDispatcher + ?Sized> JobDispatcher for Arc<T> {
    fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        (**self).dispatch(job)
    }
}

/// Dispatcher that only logs job metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl JobDispatcher for LogDispatcher {
    fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        info!(
            "event=dispatch module=dispatch status=ok queue={} job={} attempts={}",
            job.queue_name, job.job_name, job.options.attempts
        );
        Ok(())
    }
}

/// In-memory dispatcher that keeps every job it receives.
///
/// When built with `failing`, every call records the job and then fails.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<DispatchJob>>,
    failure: Option<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// Snapshot of received jobs in dispatch order.
    pub fn jobs(&self) -> Vec<DispatchJob> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs()
            .into_iter()
            .map(|job| job.job_name)
            .collect()
    }
}

impl JobDispatcher for RecordingDispatcher {
    fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());

        match &self.failure {
            Some(message) => Err(DispatchError {
                job_name: job.job_name.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
