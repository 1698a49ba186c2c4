// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::{JobStatusCode, ObjectId, ObjectType, TagHeader};

fn status(header: TagHeader, code: JobStatusCode) -> JobStatus {
    JobStatus::new(Some(header), header.job_key("acme"), code, "")
}

#[tokio::test]
async fn follow_emits_current_then_changes() {
    let hub = StatusHub::default();
    let header = TagHeader::new(ObjectType::Job, ObjectId::random());
    let key = header.job_key("acme");

    let mut rx = hub.follow(key.clone(), status(header, JobStatusCode::Running));
    assert_eq!(rx.recv().await.unwrap().status_code, JobStatusCode::Running);

    hub.publish(status(header, JobStatusCode::Finishing));
    hub.publish(status(header, JobStatusCode::Succeeded));

    assert_eq!(rx.recv().await.unwrap().status_code, JobStatusCode::Finishing);
    assert_eq!(rx.recv().await.unwrap().status_code, JobStatusCode::Succeeded);
    // Terminal status ends the stream.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn follow_ends_immediately_for_terminal_jobs() {
    let hub = StatusHub::default();
    let header = TagHeader::new(ObjectType::Job, ObjectId::random());

    let mut rx = hub.follow(header.job_key("acme"), status(header, JobStatusCode::Succeeded));
    assert_eq!(rx.recv().await.unwrap().status_code, JobStatusCode::Succeeded);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn follow_filters_other_jobs() {
    let hub = StatusHub::default();
    let followed = TagHeader::new(ObjectType::Job, ObjectId::random());
    let other = TagHeader::new(ObjectType::Job, ObjectId::random());

    let mut rx = hub.follow(followed.job_key("acme"), status(followed, JobStatusCode::Running));
    assert_eq!(rx.recv().await.unwrap().status_code, JobStatusCode::Running);

    hub.publish(status(other, JobStatusCode::Failed));
    hub.publish(status(followed, JobStatusCode::Succeeded));

    let next = rx.recv().await.unwrap();
    assert_eq!(next.job_key, followed.job_key("acme"));
    assert_eq!(next.status_code, JobStatusCode::Succeeded);
}

#[tokio::test]
async fn publish_without_subscribers_is_fine() {
    let hub = StatusHub::default();
    let header = TagHeader::new(ObjectType::Job, ObjectId::random());
    hub.publish(status(header, JobStatusCode::Queued));
}
