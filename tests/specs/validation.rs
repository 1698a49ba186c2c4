// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validation rejections happen synchronously and persist nothing.

use crate::support::{Harness, TENANT};
use drover_cache::JobCache;
use drover_metadata::MetadataClient;
use drover_core::test_support::import_model_job;
use drover_core::{AttrValue, ErrorKind, JobStatusCode, ObjectType, ATTR_JOB_OWNER};
use drover_engine::JobRequest;
use drover_exec::stub::StubExecutor;

#[tokio::test]
async fn empty_entry_point_is_rejected_without_side_effects() {
    let harness = Harness::new(StubExecutor::new());

    let mut definition = import_model_job();
    definition.import.as_mut().unwrap().entry_point.clear();

    let err = harness
        .api
        .submit_job(JobRequest::new(TENANT, definition, "alice"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    // No metadata write.
    let jobs = harness
        .store
        .search(TENANT, ObjectType::Job, ATTR_JOB_OWNER, &AttrValue::Str("alice".into()))
        .await
        .unwrap();
    assert!(jobs.is_empty());

    // No cache entry.
    assert!(harness.cache.query_state(&["QUEUED"]).await.unwrap().is_empty());

    // The executor never heard about it.
    assert!(harness.exec.calls().is_empty());
}

#[tokio::test]
async fn validate_job_reports_validated_without_persisting() {
    let harness = Harness::new(StubExecutor::new());
    let status = harness
        .api
        .validate_job(JobRequest::new(TENANT, import_model_job(), "alice"))
        .await
        .unwrap();

    assert_eq!(status.status_code, JobStatusCode::Validated);
    assert!(status.job_id.is_none());
    assert!(harness.cache.query_state(&["QUEUED"]).await.unwrap().is_empty());
    assert_eq!(harness.store.write_batch_count(), 0);
}
