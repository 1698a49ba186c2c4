// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle stages: assemble, validate, and the metadata record steps.
//!
//! Each stage takes a job and returns a job; the metadata store is the only
//! I/O. The request fields of the job are never touched — see
//! `JobState::request_view`.

use crate::error::EngineError;
use drover_core::{
    DataDefinition, JobDefinition, JobState, JobStatusCode, JobType, ModelDefinition,
    ObjectDefinition, ObjectType, ResultDefinition, ResultObject, StatusError, Tag, TagHeader,
    TagSelector, TagUpdate, ATTR_JOB_MESSAGE, ATTR_JOB_OWNER, ATTR_JOB_STATUS, ATTR_OUTPUT_NAME,
    ATTR_PARENT_JOB, ATTR_SOURCE_JOB,
};
use drover_metadata::{MetadataClient, MetadataError, WriteBatch};
use std::collections::HashMap;
use std::sync::Arc;

/// Key in `result_mapping` reserved for the RESULT object itself.
const RESULT_OBJECT_KEY: &str = "__result__";

/// Stage functions over [`JobState`], talking only to the metadata store.
pub struct JobLifecycle {
    metadata: Arc<dyn MetadataClient>,
}

impl Clone for JobLifecycle {
    fn clone(&self) -> Self {
        Self { metadata: Arc::clone(&self.metadata) }
    }
}

impl JobLifecycle {
    pub fn new(metadata: Arc<dyn MetadataClient>) -> Self {
        Self { metadata }
    }

    /// Resolve every selector reachable from the job definition and run
    /// semantic validation, accumulating all field-level issues.
    pub async fn assemble_and_validate(&self, mut job: JobState) -> Result<JobState, EngineError> {
        let mut issues = Vec::new();
        let mut resolved: HashMap<String, Tag> = HashMap::new();

        for (name, selector) in named_selectors(&job.definition) {
            match self.metadata.read_object(&job.tenant, &selector).await {
                Ok(tag) => {
                    resolved.insert(name, tag);
                }
                Err(MetadataError::NotFound(what)) => {
                    issues.push(format!("{name}: not found ({what})"));
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Flow model nodes are reachable only through the resolved flow.
        if let Some(flow_tag) = resolved.get("flow").cloned() {
            if let ObjectDefinition::Flow(flow) = &flow_tag.definition {
                for (node, selector) in flow.model_selectors() {
                    let name = format!("node:{node}");
                    match self.metadata.read_object(&job.tenant, selector).await {
                        Ok(tag) => {
                            resolved.insert(name, tag);
                        }
                        Err(MetadataError::NotFound(what)) => {
                            issues.push(format!("{name}: not found ({what})"));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            } else {
                issues.push("flow: selector does not reference a FLOW object".to_string());
            }
        }

        validate_semantics(&job.definition, &resolved, &mut issues);

        if !issues.is_empty() {
            return Err(StatusError::validation(issues.join("; ")).into());
        }

        job.resource_mapping =
            resolved.iter().map(|(name, tag)| (name.clone(), tag.header)).collect();
        job.resources =
            resolved.into_values().map(|tag| (tag.header.object_key(), tag)).collect();
        Ok(job)
    }

    /// Allocate the job's identity and write the initial PENDING job tag,
    /// attaching caller-supplied tag updates.
    pub async fn save_initial_metadata(&self, mut job: JobState) -> Result<JobState, EngineError> {
        let header = self.metadata.preallocate_id(&job.tenant, ObjectType::Job).await?;

        let mut attrs = vec![
            TagUpdate::new(ATTR_JOB_STATUS, JobStatusCode::Pending.to_string()),
            TagUpdate::new(ATTR_JOB_MESSAGE, ""),
            TagUpdate::new(ATTR_JOB_OWNER, job.owner.clone()),
        ];
        if let Some(parent) = &job.parent_key {
            attrs.push(TagUpdate::new(ATTR_PARENT_JOB, parent.as_str()));
        }
        attrs.extend(job.tag_updates.iter().cloned());

        let header = self
            .metadata
            .create_preallocated_object(
                &job.tenant,
                &header,
                ObjectDefinition::Job(job.definition.clone()),
                attrs,
            )
            .await?;

        job.job_id = Some(header);
        job.job_key = header.job_key(&job.tenant);
        job.status = JobStatusCode::Pending;
        job.status_message = "job created".to_string();
        Ok(job)
    }

    /// Write a tag-only update reflecting the job's current status. Never
    /// creates a new object version.
    pub async fn record_update(&self, job: &JobState) -> Result<(), EngineError> {
        let selector = job_selector(job)?;
        self.metadata.update_tag(&job.tenant, &selector, status_attrs(job)).await?;
        Ok(())
    }

    /// Turn the fetched result document into staged output objects, each
    /// with a preallocated identity recorded in `result_mapping` so retries
    /// produce the same objects.
    pub async fn process_result(&self, mut job: JobState) -> Result<JobState, EngineError> {
        if !job.status.is_terminal() {
            return Err(StatusError::internal(format!(
                "result processing on non-terminal status {}",
                job.status
            ))
            .into());
        }
        let job_id = job.job_id.ok_or_else(|| StatusError::internal("job id not allocated"))?;
        job.result_objects.clear();

        // Group parents never run on an executor and carry no result
        // document; their status is already derived from their children.
        // The same holds for any other job without a fetched document.
        let document = if job.status == JobStatusCode::Succeeded
            && job.job_type != JobType::JobGroup
        {
            job.job_result.clone()
        } else {
            None
        };

        if let Some(document) = document {
            let report = match parse_result_document(&document) {
                Ok(report) => report,
                Err(message) => {
                    job.status = JobStatusCode::Failed;
                    job.status_message = message;
                    return self.stage_result_object(job, job_id).await;
                }
            };
            if report.status_code != JobStatusCode::Succeeded {
                job.status = JobStatusCode::Failed;
                job.status_message = result_failure_message(&report);
                return self.stage_result_object(job, job_id).await;
            }

            for (name, definition) in report.outputs {
                let header = match job.result_mapping.get(&name) {
                    Some(header) => *header,
                    None => {
                        let header = self
                            .metadata
                            .preallocate_id(&job.tenant, definition.object_type())
                            .await?;
                        job.result_mapping.insert(name.clone(), header);
                        header
                    }
                };
                job.result_objects.push(ResultObject {
                    header,
                    definition,
                    attrs: vec![
                        TagUpdate::new(ATTR_SOURCE_JOB, job.job_key.as_str()),
                        TagUpdate::new(ATTR_OUTPUT_NAME, name),
                    ],
                });
            }
        }

        self.stage_result_object(job, job_id).await
    }

    /// Persist staged outputs and the final job status as one atomic batch.
    pub async fn record_result(&self, job: &JobState) -> Result<(), EngineError> {
        let selector = job_selector(job)?;
        let mut batch = WriteBatch::new(job.tenant.clone());
        for object in &job.result_objects {
            batch = batch.create_preallocated(
                object.header,
                object.definition.clone(),
                object.attrs.clone(),
            );
        }
        batch = batch.update_tag(selector, status_attrs(job));
        self.metadata.write_batch(batch).await?;
        Ok(())
    }

    /// Append the RESULT object describing the finished job.
    async fn stage_result_object(
        &self,
        mut job: JobState,
        job_id: TagHeader,
    ) -> Result<JobState, EngineError> {
        let header = match job.result_mapping.get(RESULT_OBJECT_KEY) {
            Some(header) => *header,
            None => {
                let header = self.metadata.preallocate_id(&job.tenant, ObjectType::Result).await?;
                job.result_mapping.insert(RESULT_OBJECT_KEY.to_string(), header);
                header
            }
        };
        let outputs = job
            .result_mapping
            .iter()
            .filter(|(name, _)| name.as_str() != RESULT_OBJECT_KEY)
            .map(|(name, header)| (name.clone(), *header))
            .collect();
        let definition = ObjectDefinition::Result(ResultDefinition {
            job_id,
            status_code: job.status,
            status_message: job.status_message.clone(),
            outputs,
        });
        job.result_objects.push(ResultObject {
            header,
            definition,
            attrs: vec![TagUpdate::new(ATTR_SOURCE_JOB, job.job_key.as_str())],
        });
        Ok(job)
    }
}

/// Selector for the job's own tag: pinned object version, latest tag.
fn job_selector(job: &JobState) -> Result<TagSelector, EngineError> {
    let header = job.job_id.ok_or_else(|| StatusError::internal("job id not allocated"))?;
    Ok(header.selector().latest_tag())
}

/// Status attributes mirrored onto the job tag.
fn status_attrs(job: &JobState) -> Vec<TagUpdate> {
    vec![
        TagUpdate::new(ATTR_JOB_STATUS, job.status.to_string()),
        TagUpdate::new(ATTR_JOB_MESSAGE, job.status_message.clone()),
    ]
}

fn parse_result_document(bytes: &[u8]) -> Result<drover_core::JobResult, String> {
    serde_json::from_slice(bytes)
        .map_err(|e| format!("EXECUTOR_FAILED: corrupt result document: {e}"))
}

fn result_failure_message(report: &drover_core::JobResult) -> String {
    match report.exit_code {
        Some(code) => format!("model runtime failed with exit code {code}: {}", report.status_message),
        None => format!("model runtime failed: {}", report.status_message),
    }
}

/// Selectors reachable directly from a job definition, with logical names.
fn named_selectors(definition: &JobDefinition) -> Vec<(String, TagSelector)> {
    let mut selectors = Vec::new();
    if let Some(model) = definition.model {
        selectors.push(("model".to_string(), model));
    }
    if let Some(flow) = definition.flow {
        selectors.push(("flow".to_string(), flow));
    }
    if let Some(storage) = definition.storage {
        selectors.push(("storage".to_string(), storage));
    }
    for (name, selector) in &definition.inputs {
        selectors.push((format!("input:{name}"), *selector));
    }
    for (name, selector) in &definition.outputs {
        selectors.push((format!("output:{name}"), *selector));
    }
    selectors
}

/// Deep semantic validation against the resolved resources.
fn validate_semantics(
    definition: &JobDefinition,
    resolved: &HashMap<String, Tag>,
    issues: &mut Vec<String>,
) {
    match definition.job_type {
        JobType::ImportModel => validate_import(definition, issues),
        JobType::RunModel => validate_run_model(definition, resolved, issues),
        JobType::RunFlow => validate_run_flow(definition, resolved, issues),
        JobType::ImportData => {
            if definition.storage.is_none() {
                issues.push("storage: required for IMPORT_DATA".to_string());
            } else {
                expect_type(resolved, "storage", ObjectType::Storage, issues);
            }
        }
        JobType::ExportData => {
            if definition.storage.is_none() {
                issues.push("storage: required for EXPORT_DATA".to_string());
            } else {
                expect_type(resolved, "storage", ObjectType::Storage, issues);
            }
            if definition.inputs.is_empty() {
                issues.push("inputs: EXPORT_DATA requires at least one input".to_string());
            }
        }
        JobType::JobGroup => {
            if definition.children.is_empty() {
                issues.push("children: JOB_GROUP requires at least one child".to_string());
            }
            for (index, child) in definition.children.iter().enumerate() {
                if child.job_type == JobType::JobGroup {
                    issues.push(format!("children[{index}]: nested JOB_GROUP is not supported"));
                }
            }
        }
    }
}

fn validate_import(definition: &JobDefinition, issues: &mut Vec<String>) {
    match &definition.import {
        None => issues.push("import: required for IMPORT_MODEL".to_string()),
        Some(details) => {
            if details.entry_point.is_empty() {
                issues.push("import.entry_point: must not be empty".to_string());
            }
            if details.repo.is_empty() {
                issues.push("import.repo: must not be empty".to_string());
            }
            if details.version.is_empty() {
                issues.push("import.version: must not be empty".to_string());
            }
        }
    }
}

fn validate_run_model(
    definition: &JobDefinition,
    resolved: &HashMap<String, Tag>,
    issues: &mut Vec<String>,
) {
    if definition.model.is_none() {
        issues.push("model: required for RUN_MODEL".to_string());
        return;
    }
    let Some(model) = resolved.get("model").and_then(|t| t.definition.as_model()) else {
        if resolved.contains_key("model") {
            issues.push("model: selector does not reference a MODEL object".to_string());
        }
        return;
    };
    validate_model_binding(definition, model, resolved, issues);
}

fn validate_model_binding(
    definition: &JobDefinition,
    model: &ModelDefinition,
    resolved: &HashMap<String, Tag>,
    issues: &mut Vec<String>,
) {
    // Every required model input must be bound and schema-compatible.
    for (name, port) in &model.inputs {
        if !definition.inputs.contains_key(name) {
            if !port.optional {
                issues.push(format!("inputs.{name}: required by model"));
            }
            continue;
        }
        if let Some(data) = data_of(resolved, &format!("input:{name}"), issues) {
            if !data.schema.is_compatible_with(&port.schema) {
                issues.push(format!("inputs.{name}: dataset schema missing required fields"));
            }
        }
    }
    for name in definition.inputs.keys() {
        if !model.inputs.contains_key(name) {
            issues.push(format!("inputs.{name}: not declared by model"));
        }
    }

    // Parameters: declared, present or defaulted, and type-correct.
    for (name, spec) in &model.parameters {
        match definition.parameters.get(name) {
            Some(value) => {
                if !spec.param_type.admits(value) {
                    issues.push(format!("parameters.{name}: expected {}", spec.param_type));
                }
            }
            None => {
                if spec.default_value.is_none() {
                    issues.push(format!("parameters.{name}: required by model"));
                }
            }
        }
    }
    for name in definition.parameters.keys() {
        if !model.parameters.contains_key(name) {
            issues.push(format!("parameters.{name}: not declared by model"));
        }
    }

    // Prior output versions must stay schema-compatible.
    for name in definition.outputs.keys() {
        let Some(port) = model.outputs.get(name) else {
            issues.push(format!("outputs.{name}: not declared by model"));
            continue;
        };
        if let Some(prior) = data_of(resolved, &format!("output:{name}"), issues) {
            if !port.schema.is_compatible_with(&prior.schema) {
                issues.push(format!("outputs.{name}: incompatible with prior version schema"));
            }
        }
    }
}

fn validate_run_flow(
    definition: &JobDefinition,
    resolved: &HashMap<String, Tag>,
    issues: &mut Vec<String>,
) {
    if definition.flow.is_none() {
        issues.push("flow: required for RUN_FLOW".to_string());
        return;
    }
    let Some(flow_tag) = resolved.get("flow") else { return };
    let ObjectDefinition::Flow(flow) = &flow_tag.definition else { return };

    if flow.model_selectors().next().is_none() {
        issues.push("flow: contains no model nodes".to_string());
    }
    for (name, node) in &flow.nodes {
        if matches!(node, drover_core::FlowNode::Input) && !definition.inputs.contains_key(name) {
            issues.push(format!("inputs.{name}: required by flow input node"));
        }
    }
    for (node, _) in flow.model_selectors() {
        expect_type(resolved, &format!("node:{node}"), ObjectType::Model, issues);
    }
}

fn expect_type(
    resolved: &HashMap<String, Tag>,
    name: &str,
    object_type: ObjectType,
    issues: &mut Vec<String>,
) {
    if let Some(tag) = resolved.get(name) {
        if tag.definition.object_type() != object_type {
            issues.push(format!("{name}: selector does not reference a {object_type} object"));
        }
    }
}

fn data_of<'a>(
    resolved: &'a HashMap<String, Tag>,
    name: &str,
    issues: &mut Vec<String>,
) -> Option<&'a DataDefinition> {
    let tag = resolved.get(name)?;
    match tag.definition.as_data() {
        Some(data) => Some(data),
        None => {
            issues.push(format!("{name}: selector does not reference a DATA object"));
            None
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
