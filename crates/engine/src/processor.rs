// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job state machine.
//!
//! `next_action` decides what external work a job needs; the `apply_*`
//! functions fold the outcome of that work back into the job. Both sides are
//! pure — the scheduler performs the external call between them, so
//! suspension and cancellation points are explicit.

use drover_core::{JobState, JobStatusCode, JobType};
use drover_exec::{BatchStatus, BatchStatusCode};
use std::time::Duration;

/// External work the scheduler performs for a job, decided by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stage inputs and submit the batch to the executor.
    Submit,
    /// Poll the executor for batch status.
    Poll,
    /// Gather child statuses for a group parent.
    PollGroup,
    /// Fetch the result document from the executor workspace.
    FetchResult,
    /// Cancel the batch, then record the final state and delete the entry.
    CancelAndFinalize,
    /// Record the final state in metadata and delete the entry.
    Finalize,
}

impl Action {
    /// Action name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::Poll => "poll",
            Action::PollGroup => "poll_group",
            Action::FetchResult => "fetch_result",
            Action::CancelAndFinalize => "cancel",
            Action::Finalize => "finalize",
        }
    }
}

/// Decide the next action for a job, or `None` when nothing is due.
///
/// Poll-style actions are throttled by `poll_interval`.
pub fn next_action(job: &JobState, now_ms: u64, poll_interval: Duration) -> Option<Action> {
    let poll_due =
        || now_ms.saturating_sub(job.last_poll_ms) >= poll_interval.as_millis() as u64;
    match job.status {
        JobStatusCode::Queued => {
            if job.job_type == JobType::JobGroup {
                Some(Action::PollGroup)
            } else {
                Some(Action::Submit)
            }
        }
        JobStatusCode::Submitted | JobStatusCode::Running => {
            if !poll_due() {
                return None;
            }
            if job.job_type == JobType::JobGroup {
                Some(Action::PollGroup)
            } else {
                Some(Action::Poll)
            }
        }
        JobStatusCode::Finishing => Some(Action::FetchResult),
        JobStatusCode::Succeeded | JobStatusCode::Failed => Some(Action::Finalize),
        JobStatusCode::Cancelled => Some(Action::CancelAndFinalize),
        JobStatusCode::Pending | JobStatusCode::Validated => None,
    }
}

/// Fold a successful submit into the job.
pub fn apply_submit(mut job: JobState, executor_state: Vec<u8>) -> JobState {
    job.executor_state = Some(executor_state);
    job.retries = 0;
    job.with_status(JobStatusCode::Submitted, "batch accepted by executor")
}

/// Fold a poll result into the job.
pub fn apply_poll(mut job: JobState, status: &BatchStatus, now_ms: u64) -> JobState {
    job.last_poll_ms = now_ms;
    match status.code {
        BatchStatusCode::Queued => job,
        BatchStatusCode::Running => {
            if job.status == JobStatusCode::Running {
                job
            } else {
                job.with_status(JobStatusCode::Running, "batch running")
            }
        }
        BatchStatusCode::Succeeded => {
            job.with_status(JobStatusCode::Finishing, "batch complete, fetching result")
        }
        BatchStatusCode::Failed => {
            let message = match status.exit_code {
                Some(code) => format!("batch failed with exit code {code}"),
                None => format!("batch failed: {}", status.message),
            };
            job.with_status(JobStatusCode::Failed, message)
        }
        BatchStatusCode::Cancelled => {
            job.with_status(JobStatusCode::Cancelled, "batch cancelled by executor")
        }
    }
}

/// Fold the fetched result document into the job.
pub fn apply_fetch(mut job: JobState, document: Vec<u8>) -> JobState {
    job.job_result = Some(document);
    job.retries = 0;
    job.with_status(JobStatusCode::Succeeded, "result document fetched")
}

/// Fold child progress into a group parent.
pub fn apply_group_progress(
    mut job: JobState,
    children: &[JobStatusCode],
    now_ms: u64,
) -> JobState {
    job.last_poll_ms = now_ms;
    let total = children.len();
    let terminal = children.iter().filter(|s| s.is_terminal()).count();
    if terminal < total {
        let message = format!("{terminal}/{total} children complete");
        return if job.status == JobStatusCode::Queued {
            job.with_status(JobStatusCode::Running, message)
        } else {
            job.status_message = message;
            job
        };
    }
    if children.iter().all(|s| *s == JobStatusCode::Succeeded) {
        job.with_status(JobStatusCode::Succeeded, format!("{total}/{total} children succeeded"))
    } else {
        let failed = children.iter().filter(|s| !matches!(s, JobStatusCode::Succeeded)).count();
        job.with_status(JobStatusCode::Failed, format!("{failed}/{total} children did not succeed"))
    }
}

/// Fold a transient failure into the job: bounded retry, then FAILED.
pub fn apply_transient_failure(
    mut job: JobState,
    message: String,
    retry_limit: u32,
) -> JobState {
    job.retries += 1;
    if job.retries > retry_limit {
        let retries = job.retries;
        job.with_status(
            JobStatusCode::Failed,
            format!("giving up after {retries} attempts: {message}"),
        )
    } else {
        job.status_message = message;
        job
    }
}

/// Fold a non-retryable failure into the job.
pub fn apply_terminal_failure(job: JobState, message: String) -> JobState {
    job.with_status(JobStatusCode::Failed, message)
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
