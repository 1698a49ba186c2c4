// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JOB_GROUP parents derive their terminal status from their children.

use crate::support::{import_success_document, Harness, TENANT};
use drover_cache::JobCache;
use drover_metadata::MetadataClient;
use drover_core::test_support::import_model_job;
use drover_core::{JobDefinition, JobStatusCode, JobType, ATTR_JOB_STATUS, ATTR_PARENT_JOB};
use drover_engine::JobRequest;
use drover_exec::stub::StubExecutor;
use drover_exec::{BatchStatus, BatchStatusCode};
use std::time::Duration;

fn group_of(children: usize) -> JobDefinition {
    JobDefinition {
        job_type: JobType::JobGroup,
        children: (0..children).map(|_| import_model_job()).collect(),
        ..Default::default()
    }
}

async fn drive(harness: &Harness, key: &drover_core::JobKey, ticks: usize) {
    for _ in 0..ticks {
        harness.scheduler.tick().await;
        harness.clock.advance(Duration::from_secs(2));
        if harness.cache.get_entry(key).await.unwrap().is_none() {
            return;
        }
    }
}

#[tokio::test]
async fn group_succeeds_when_all_children_succeed() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness
        .api
        .submit_job(JobRequest::new(TENANT, group_of(2), "alice"))
        .await
        .unwrap();

    // Children carry the parent reference on their job tags.
    let parent_attr = drover_core::AttrValue::Str(submitted.job_key.as_str().to_string());
    let children = harness
        .store
        .search(TENANT, drover_core::ObjectType::Job, ATTR_PARENT_JOB, &parent_attr)
        .await
        .unwrap();
    assert_eq!(children.len(), 2);

    drive(&harness, &submitted.job_key, 20).await;

    assert!(harness.cache.get_entry(&submitted.job_key).await.unwrap().is_none());
    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("SUCCEEDED"));

    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Succeeded);
}

#[tokio::test]
async fn group_fails_when_any_child_fails() {
    let exec = StubExecutor::new()
        .with_script(vec![BatchStatus::new(BatchStatusCode::Failed).with_exit_code(1)]);
    let harness = Harness::new(exec);
    let submitted = harness
        .api
        .submit_job(JobRequest::new(TENANT, group_of(2), "alice"))
        .await
        .unwrap();

    drive(&harness, &submitted.job_key, 20).await;

    assert!(harness.cache.get_entry(&submitted.job_key).await.unwrap().is_none());
    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("FAILED"));
}

#[tokio::test]
async fn group_tracks_children_that_outlive_the_cache() {
    // One child finishes and is recorded/removed well before the other;
    // the parent must read its terminal status from the metadata store.
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness
        .api
        .submit_job(JobRequest::new(TENANT, group_of(1), "alice"))
        .await
        .unwrap();

    drive(&harness, &submitted.job_key, 20).await;
    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("SUCCEEDED"));
}
