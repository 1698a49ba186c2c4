// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancelling a running job terminates the batch and records CANCELLED.

use crate::support::{import_success_document, Harness, TENANT};
use drover_core::{JobStatusCode, ATTR_JOB_STATUS};
use drover_exec::stub::StubExecutor;
use drover_exec::{BatchStatus, BatchStatusCode};

fn long_running_executor() -> StubExecutor {
    // Stays RUNNING until cancelled.
    StubExecutor::new()
        .with_script(vec![BatchStatus::new(BatchStatusCode::Running)])
        .with_result_document(import_success_document())
}

#[tokio::test]
async fn cancel_during_running_terminates_the_batch() {
    let harness = Harness::new(long_running_executor());
    let submitted = harness.submit_import().await;
    let selector = Harness::job_selector(&submitted);

    harness.drive_until_status(&submitted.job_key, JobStatusCode::Running).await;

    let cancelled = harness.api.cancel_job(TENANT, &selector).await.unwrap();
    assert_eq!(cancelled.status_code, JobStatusCode::Cancelled);

    // Observable immediately through checkJob.
    let checked = harness.api.check_job(TENANT, &selector).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Cancelled);

    // The scheduler cancels the batch, records the result, and removes the
    // entry.
    harness.drive_until_removed(&submitted.job_key).await;
    assert!(harness.exec.was_cancelled(submitted.job_key.as_str()));

    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("CANCELLED"));

    let after = harness.api.check_job(TENANT, &selector).await.unwrap();
    assert_eq!(after.status_code, JobStatusCode::Cancelled);
}

#[tokio::test]
async fn cancel_after_terminal_is_idempotent() {
    let harness = Harness::new(long_running_executor());
    let submitted = harness.submit_import().await;
    let selector = Harness::job_selector(&submitted);

    harness.drive_until_status(&submitted.job_key, JobStatusCode::Running).await;
    harness.api.cancel_job(TENANT, &selector).await.unwrap();
    harness.drive_until_removed(&submitted.job_key).await;

    // Cancelling a job that already reached a terminal state is a no-op
    // returning the terminal status.
    let repeat = harness.api.cancel_job(TENANT, &selector).await.unwrap();
    assert_eq!(repeat.status_code, JobStatusCode::Cancelled);

    // The executor saw exactly one cancel for this batch.
    let cancels = harness
        .exec
        .calls()
        .iter()
        .filter(|c| c.starts_with("cancel:"))
        .count();
    assert_eq!(cancels, 1);
}

#[tokio::test]
async fn cancel_without_cancellation_capability_still_records() {
    let exec = StubExecutor::new()
        .with_script(vec![BatchStatus::new(BatchStatusCode::Running)])
        .without_cancellation();
    let harness = Harness::new(exec);
    let submitted = harness.submit_import().await;
    let selector = Harness::job_selector(&submitted);

    harness.drive_until_status(&submitted.job_key, JobStatusCode::Running).await;
    harness.api.cancel_job(TENANT, &selector).await.unwrap();
    harness.drive_until_removed(&submitted.job_key).await;

    // No cancel call was possible, but the job still records CANCELLED and
    // the batch workspace is deleted.
    assert!(!harness.exec.was_cancelled(submitted.job_key.as_str()));
    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("CANCELLED"));
    assert!(!harness.exec.batch_exists(submitted.job_key.as_str()));
}
