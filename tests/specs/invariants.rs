// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-component invariants exercised through the public surfaces.

use crate::support::{import_success_document, Harness, TENANT};
use drover_cache::JobCache;
use drover_core::{JobState, JobStatusCode, OrchestratorConfig};
use drover_exec::stub::StubExecutor;
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test]
async fn job_keys_are_unique_across_submissions() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let mut seen = HashSet::new();
    for _ in 0..25 {
        let status = harness.submit_import().await;
        assert!(seen.insert(status.job_key.clone()), "duplicate job key {}", status.job_key);
        assert!(seen.len() <= 25);
    }
}

#[tokio::test]
async fn revisions_advance_by_one_per_transition() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness.submit_import().await;
    let key = submitted.job_key.clone();

    let mut last_revision = harness.cache.get_entry(&key).await.unwrap().unwrap().revision;
    assert_eq!(last_revision, 1);

    for _ in 0..15 {
        harness.scheduler.tick().await;
        harness.clock.advance(Duration::from_secs(2));
        match harness.cache.get_entry(&key).await.unwrap() {
            Some(entry) => {
                assert!(
                    entry.revision == last_revision || entry.revision == last_revision + 1,
                    "revision jumped from {last_revision} to {}",
                    entry.revision
                );
                last_revision = entry.revision;
            }
            None => return,
        }
    }
    panic!("job never completed");
}

#[tokio::test]
async fn executor_calls_run_under_a_deadline() {
    // A stalled executor must not wedge the scheduler: the operation
    // deadline fires and the job takes a retryable failure.
    let config = OrchestratorConfig::default()
        .executor("stub")
        .operation_deadline(Duration::from_millis(50))
        .lease_duration(Duration::from_secs(30));
    let harness = Harness::with_config(
        StubExecutor::new().with_result_document(import_success_document()),
        config,
    );
    harness.exec.set_poll_delay(Duration::from_secs(5));

    let submitted = harness.submit_import().await;
    let key = submitted.job_key.clone();

    harness.scheduler.tick().await; // submit
    harness.clock.advance(Duration::from_secs(2));

    let started = std::time::Instant::now();
    harness.scheduler.tick().await; // poll hits the deadline
    assert!(started.elapsed() < Duration::from_secs(5), "tick waited out the stalled poll");

    let entry = harness.cache.get_entry(&key).await.unwrap().unwrap();
    let job: JobState = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(job.retries, 1);
    assert!(job.status_message.contains("deadline"), "{}", job.status_message);
}

#[tokio::test]
async fn terminal_state_is_one_batch_write() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let first = harness.submit_import().await;
    let second = harness.submit_import().await;

    harness.drive_until_removed(&first.job_key).await;
    harness.drive_until_removed(&second.job_key).await;

    // One batch write per job, nothing more.
    assert_eq!(harness.store.write_batch_count(), 2);
    for status in [&first, &second] {
        let checked = harness.api.check_job(TENANT, &Harness::job_selector(status)).await.unwrap();
        assert_eq!(checked.status_code, JobStatusCode::Succeeded);
    }
}
