// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A crashing batch fails the job exactly once, with the exit code recorded.

use crate::support::{Harness, TENANT};
use drover_cache::JobCache;
use drover_core::{JobStatusCode, ATTR_JOB_MESSAGE, ATTR_JOB_STATUS};
use drover_exec::stub::StubExecutor;
use drover_exec::{BatchStatus, BatchStatusCode};

#[tokio::test]
async fn batch_crash_fails_the_job_with_exit_code() {
    let exec = StubExecutor::new().with_script(vec![
        BatchStatus::new(BatchStatusCode::Failed).with_exit_code(139),
    ]);
    let harness = Harness::new(exec);

    let submitted = harness.submit_import().await;
    harness.drive_until_removed(&submitted.job_key).await;

    // Terminal FAILED with the exit code in the message, one batch write,
    // cache entry removed.
    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("FAILED"));
    assert!(
        tag.attr_str(ATTR_JOB_MESSAGE).unwrap_or_default().contains("139"),
        "{:?}",
        tag.attrs
    );
    assert_eq!(harness.store.write_batch_count(), 1);
    assert!(harness.cache.get_entry(&submitted.job_key).await.unwrap().is_none());

    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Failed);
}

#[tokio::test]
async fn corrupt_result_document_is_executor_failure() {
    // Batch reports success but writes an unreadable result document.
    let exec = StubExecutor::new().with_result_document(b"}{not json".to_vec());
    let harness = Harness::new(exec);

    let submitted = harness.submit_import().await;
    harness.drive_until_removed(&submitted.job_key).await;

    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("FAILED"));
    assert!(
        tag.attr_str(ATTR_JOB_MESSAGE).unwrap_or_default().contains("EXECUTOR_FAILED"),
        "{:?}",
        tag.attrs
    );
}
