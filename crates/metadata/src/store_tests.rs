// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::WriteBatch;
use drover_core::test_support::hello_model;
use drover_core::{FakeClock, JobDefinition, ATTR_JOB_STATUS};

fn store() -> MemoryMetadataStore<FakeClock> {
    MemoryMetadataStore::new(FakeClock::new())
}

fn model_def() -> ObjectDefinition {
    ObjectDefinition::Model(hello_model())
}

#[tokio::test]
async fn preallocated_id_is_invisible_until_created() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();

    let err = store.read_object("acme", &TagSelector::latest(ObjectType::Model, header.object_id)).await;
    assert!(matches!(err, Err(MetadataError::NotFound(_))));

    store
        .create_preallocated_object("acme", &header, model_def(), vec![])
        .await
        .unwrap();
    let tag = store
        .read_object("acme", &TagSelector::latest(ObjectType::Model, header.object_id))
        .await
        .unwrap();
    assert_eq!(tag.header.object_version, 1);
    assert!(tag.attr(ATTR_CREATE_TIME).is_some());
}

#[tokio::test]
async fn create_rejects_wrong_type() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Data).await.unwrap();
    let err = store
        .create_preallocated_object("acme", &header, model_def(), vec![])
        .await;
    assert!(matches!(err, Err(MetadataError::BadRequest(_))));
}

#[tokio::test]
async fn create_replay_is_idempotent() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    store.create_preallocated_object("acme", &header, model_def(), vec![]).await.unwrap();
    // Identical replay succeeds without a new version.
    let replayed = store
        .create_preallocated_object("acme", &header, model_def(), vec![])
        .await
        .unwrap();
    assert_eq!(replayed.object_version, 1);

    // Different content is a conflict.
    let err = store
        .create_preallocated_object(
            "acme",
            &header,
            ObjectDefinition::Model(drover_core::ModelDefinition::default()),
            vec![],
        )
        .await;
    assert!(matches!(err, Err(MetadataError::AlreadyExists(_))));
}

#[tokio::test]
async fn update_tag_appends_tag_version_only() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    store.create_preallocated_object("acme", &header, model_def(), vec![]).await.unwrap();

    let selector = TagSelector::latest(ObjectType::Model, header.object_id);
    let updated = store
        .update_tag("acme", &selector, vec![TagUpdate::new("stage", "prod")])
        .await
        .unwrap();
    assert_eq!(updated.object_version, 1);
    assert_eq!(updated.tag_version, 2);

    let tag = store.read_object("acme", &selector).await.unwrap();
    assert_eq!(tag.attr_str("stage"), Some("prod"));

    // Prior tag version still readable.
    let mut pinned = selector;
    pinned.tag_version = VersionCriteria::Number(1);
    let old = store.read_object("acme", &pinned).await.unwrap();
    assert_eq!(old.attr("stage"), None);
}

#[tokio::test]
async fn update_tag_replay_is_idempotent() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    store.create_preallocated_object("acme", &header, model_def(), vec![]).await.unwrap();
    let selector = TagSelector::latest(ObjectType::Model, header.object_id);

    let first = store
        .update_tag("acme", &selector, vec![TagUpdate::new("stage", "prod")])
        .await
        .unwrap();
    let replay = store
        .update_tag("acme", &selector, vec![TagUpdate::new("stage", "prod")])
        .await
        .unwrap();
    assert_eq!(first.tag_version, replay.tag_version);
}

#[tokio::test]
async fn update_object_appends_version() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    store.create_preallocated_object("acme", &header, model_def(), vec![]).await.unwrap();

    let selector = TagSelector::latest(ObjectType::Model, header.object_id);
    let v2 = store.update_object("acme", &selector, model_def(), vec![]).await.unwrap();
    assert_eq!(v2.object_version, 2);

    // Version 1 is still there, append-only.
    let mut pinned = selector;
    pinned.object_version = VersionCriteria::Number(1);
    assert!(store.read_object("acme", &pinned).await.is_ok());
}

#[tokio::test]
async fn write_batch_is_atomic() {
    let store = store();
    let good = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    // Second op refers to an object that was never preallocated.
    let bad = TagHeader::new(ObjectType::Model, ObjectId::random());

    let batch = WriteBatch::new("acme")
        .create_preallocated(good, model_def(), vec![])
        .create_preallocated(bad, model_def(), vec![]);
    assert!(store.write_batch(batch).await.is_err());

    // Nothing from the failed batch is visible.
    let err = store.read_object("acme", &TagSelector::latest(ObjectType::Model, good.object_id)).await;
    assert!(matches!(err, Err(MetadataError::NotFound(_))));
    assert_eq!(store.write_batch_count(), 0);
}

#[tokio::test]
async fn write_batch_shares_create_time() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(5_000);
    let store = MemoryMetadataStore::new(clock);
    let a = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    let b = store.preallocate_id("acme", ObjectType::Data).await.unwrap();

    let batch = WriteBatch::new("acme")
        .create_preallocated(a, model_def(), vec![])
        .create_preallocated(b, ObjectDefinition::Data(drover_core::DataDefinition::default()), vec![]);
    store.write_batch(batch).await.unwrap();

    let tag_a = store.read_object("acme", &TagSelector::latest(ObjectType::Model, a.object_id)).await.unwrap();
    let tag_b = store.read_object("acme", &TagSelector::latest(ObjectType::Data, b.object_id)).await.unwrap();
    assert_eq!(tag_a.attr(ATTR_CREATE_TIME), Some(&AttrValue::Int(5_000)));
    assert_eq!(tag_a.attr(ATTR_CREATE_TIME), tag_b.attr(ATTR_CREATE_TIME));
}

#[tokio::test]
async fn injected_failures_then_success() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Model).await.unwrap();
    store.fail_next_write_batches(2);

    let batch = WriteBatch::new("acme").create_preallocated(header, model_def(), vec![]);
    assert!(matches!(store.write_batch(batch.clone()).await, Err(MetadataError::Unavailable(_))));
    assert!(matches!(store.write_batch(batch.clone()).await, Err(MetadataError::Unavailable(_))));
    store.write_batch(batch).await.unwrap();
    assert_eq!(store.write_batch_count(), 1);
}

#[tokio::test]
async fn search_matches_latest_tags() {
    let store = store();
    let header = store.preallocate_id("acme", ObjectType::Job).await.unwrap();
    store
        .create_preallocated_object(
            "acme",
            &header,
            ObjectDefinition::Job(JobDefinition::default()),
            vec![TagUpdate::new(ATTR_JOB_STATUS, "SUCCEEDED")],
        )
        .await
        .unwrap();

    let hits = store
        .search("acme", ObjectType::Job, ATTR_JOB_STATUS, &AttrValue::Str("SUCCEEDED".into()))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].header.object_id, header.object_id);

    // Tenant isolation.
    let other = store
        .search("megacorp", ObjectType::Job, ATTR_JOB_STATUS, &AttrValue::Str("SUCCEEDED".into()))
        .await
        .unwrap();
    assert!(other.is_empty());
}
