// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A worker that sleeps past lease expiry loses the job: its write is
//! rejected and another worker advances the entry, with no double-write
//! observable in the metadata store.

use crate::support::{import_success_document, Harness, TENANT};
use drover_cache::JobCache;
use drover_core::{JobState, JobStatusCode};
use drover_exec::stub::StubExecutor;
use std::time::Duration;

const LEASE: Duration = Duration::from_secs(30);

#[tokio::test]
async fn expired_lease_is_reclaimed_and_stale_write_rejected() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness.submit_import().await;
    let key = submitted.job_key.clone();

    let entry = harness.cache.get_entry(&key).await.unwrap().unwrap();

    // Worker A claims the job, then stalls past lease expiry.
    let worker_a = harness.cache.open_ticket(&key, entry.revision, LEASE).await.unwrap();
    harness.clock.advance(LEASE + Duration::from_millis(1));

    // Worker B reclaims at expiry+ε and advances the entry.
    let worker_b = harness.cache.open_ticket(&key, entry.revision, LEASE).await.unwrap();
    let mut reclaimed: JobState = serde_json::from_slice(&entry.value).unwrap();
    reclaimed.status_message = "reclaimed after lease expiry".to_string();
    let value = serde_json::to_vec(&reclaimed).unwrap();
    let revision = harness.cache.update_entry(&worker_b, "QUEUED", &value).await.unwrap();
    assert_eq!(revision, entry.revision + 1);
    harness.cache.close_ticket(&worker_b).await;

    // Worker A wakes up; its pending mutation must be discarded.
    let stale: JobState = serde_json::from_slice::<JobState>(&entry.value)
        .unwrap()
        .with_status(JobStatusCode::Failed, "stale write");
    let stale_value = serde_json::to_vec(&stale).unwrap();
    let err = harness.cache.update_entry(&worker_a, "FAILED", &stale_value).await.unwrap_err();
    assert!(err.is_concurrency_loss(), "unexpected error: {err}");

    let current = harness.cache.get_entry(&key).await.unwrap().unwrap();
    assert_eq!(current.status, "QUEUED");
    assert_eq!(current.value, value);

    // The job still completes normally under the scheduler, and exactly one
    // batch write records the final state — no double write from worker A.
    harness.drive_until_removed(&key).await;
    assert_eq!(harness.store.write_batch_count(), 1);
    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Succeeded);
}
