// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A transient metadata outage during result recording retries and commits
//! exactly once, with every output landing on its preallocated identity.

use crate::support::{import_success_document, Harness, TENANT};
use drover_cache::JobCache;
use drover_metadata::MetadataClient;
use drover_core::{AttrValue, JobState, JobStatusCode, ObjectType, ATTR_SOURCE_JOB};
use drover_exec::stub::StubExecutor;
use std::time::Duration;

#[tokio::test]
async fn final_write_outage_retries_then_commits_once() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness.submit_import().await;
    let key = submitted.job_key.clone();

    // Run up to the point where only result recording remains.
    harness.drive_until_status(&key, JobStatusCode::Succeeded).await;
    harness.store.fail_next_write_batches(2);

    // First failed attempt.
    harness.scheduler.tick().await;
    harness.clock.advance(Duration::from_secs(2));
    let entry = harness.cache.get_entry(&key).await.unwrap().unwrap();
    let job: JobState = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(job.status, JobStatusCode::Succeeded);
    assert_eq!(job.retries, 1);
    let mapping_after_first = job.result_mapping.clone();
    assert!(!mapping_after_first.is_empty());

    // Second failed attempt: retry counter increments, identities stable.
    harness.scheduler.tick().await;
    harness.clock.advance(Duration::from_secs(2));
    let entry = harness.cache.get_entry(&key).await.unwrap().unwrap();
    let job: JobState = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(job.retries, 2);
    similar_asserts::assert_eq!(job.result_mapping, mapping_after_first);

    // Third attempt succeeds.
    harness.drive_until_removed(&key).await;
    assert_eq!(harness.store.write_batch_count(), 1);

    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Succeeded);

    // Exactly one copy of each output object exists.
    let outputs = harness
        .store
        .search(
            TENANT,
            ObjectType::Model,
            ATTR_SOURCE_JOB,
            &AttrValue::Str(key.as_str().to_string()),
        )
        .await
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].header.object_version, 1);
    assert_eq!(outputs[0].header.object_id, mapping_after_first.get("model").unwrap().object_id);
}
