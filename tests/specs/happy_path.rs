// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submit an IMPORT_MODEL job and watch it run to completion.

use crate::support::{drain_statuses, import_success_document, Harness, TENANT};
use drover_metadata::MetadataClient;
use drover_core::{
    JobStatusCode, ObjectDefinition, ObjectType, TagSelector, ATTR_JOB_STATUS, ATTR_OUTPUT_NAME,
};
use drover_exec::stub::StubExecutor;

#[tokio::test]
async fn import_model_runs_to_succeeded() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));

    let submitted = harness.submit_import().await;
    assert_eq!(submitted.status_code, JobStatusCode::Queued);

    let mut follow =
        harness.api.follow_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();

    harness.drive_until_removed(&submitted.job_key).await;

    // Observed sequence: queued, then each transition through success.
    let observed = drain_statuses(&mut follow).await;
    let expected = [
        JobStatusCode::Queued,
        JobStatusCode::Submitted,
        JobStatusCode::Running,
        JobStatusCode::Finishing,
        JobStatusCode::Succeeded,
    ];
    let mut expected_iter = expected.iter();
    for status in &observed {
        if Some(status) == expected_iter.clone().next() {
            expected_iter.next();
        }
    }
    assert!(
        expected_iter.next().is_none(),
        "observed {observed:?} does not contain the expected sequence {expected:?}"
    );

    // checkJob after deletion falls back to metadata.
    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Succeeded);

    let tag = harness.job_tag(&submitted).await;
    assert_eq!(tag.attr_str(ATTR_JOB_STATUS), Some("SUCCEEDED"));
}

#[tokio::test]
async fn recorded_result_matches_the_produced_outputs() {
    let harness =
        Harness::new(StubExecutor::new().with_result_document(import_success_document()));
    let submitted = harness.submit_import().await;
    harness.drive_until_removed(&submitted.job_key).await;

    // The RESULT object names the job and resolves to the recorded output.
    let results = harness
        .store
        .search(
            TENANT,
            ObjectType::Result,
            drover_core::ATTR_SOURCE_JOB,
            &drover_core::AttrValue::Str(submitted.job_key.as_str().to_string()),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    let ObjectDefinition::Result(result) = &results[0].definition else {
        panic!("expected a RESULT definition");
    };
    assert_eq!(result.status_code, JobStatusCode::Succeeded);
    assert_eq!(result.job_id, submitted.job_id.unwrap());

    let output_header = result.outputs.get("model").unwrap();
    let output = harness
        .store
        .read_object(TENANT, &TagSelector::latest(ObjectType::Model, output_header.object_id))
        .await
        .unwrap();
    assert_eq!(output.attr_str(ATTR_OUTPUT_NAME), Some("model"));
    assert!(matches!(output.definition, ObjectDefinition::Model(_)));
}

#[tokio::test]
async fn import_model_succeeds_on_the_relational_cache() {
    let harness = Harness::with_sql_cache(
        StubExecutor::new().with_result_document(import_success_document()),
    )
    .await;

    let submitted = harness.submit_import().await;
    harness.drive_until_removed(&submitted.job_key).await;

    let checked =
        harness.api.check_job(TENANT, &Harness::job_selector(&submitted)).await.unwrap();
    assert_eq!(checked.status_code, JobStatusCode::Succeeded);
}
