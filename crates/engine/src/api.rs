// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous job API: validate, submit, check, cancel, follow.
//!
//! Bulk input validation (required fields, well-formed selectors) happens
//! here; deep semantic validation lives in the lifecycle. The API is
//! stateless — everything durable goes through the metadata store and the
//! job cache.

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::lifecycle::JobLifecycle;
use crate::monitor::StatusHub;
use drover_core::{
    Clock, JobDefinition, JobKey, JobState, JobStatus, JobStatusCode, JobType, StatusError,
    TagHeader, TagSelector, TagUpdate, VersionCriteria, ATTR_JOB_MESSAGE, ATTR_JOB_STATUS,
    ErrorKind, ObjectType,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A job request as it arrives over the wire.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub tenant: String,
    pub definition: JobDefinition,
    pub tag_updates: Vec<TagUpdate>,
    pub owner: String,
    pub owner_token: String,
}

impl JobRequest {
    pub fn new(tenant: impl Into<String>, definition: JobDefinition, owner: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            definition,
            tag_updates: Vec::new(),
            owner: owner.into(),
            owner_token: String::new(),
        }
    }

    drover_core::setters! {
        into {
            owner_token: String,
        }
        set {
            tag_updates: Vec<TagUpdate>,
        }
    }
}

/// Entry points for job submission and tracking.
pub struct JobApi<C: Clock> {
    ctx: EngineContext<C>,
    lifecycle: JobLifecycle,
    hub: StatusHub,
}

impl<C: Clock> JobApi<C> {
    pub fn new(ctx: EngineContext<C>, hub: StatusHub) -> Self {
        let lifecycle = JobLifecycle::new(Arc::clone(&ctx.metadata));
        Self { ctx, lifecycle, hub }
    }

    /// Assemble and validate without persisting anything.
    pub async fn validate_job(&self, request: JobRequest) -> Result<JobStatus, EngineError> {
        bulk_validate(&request)?;
        let job = job_of(&request);
        self.lifecycle.assemble_and_validate(job).await?;
        Ok(JobStatus::new(None, JobKey::default(), JobStatusCode::Validated, "validation passed"))
    }

    /// Validate, persist initial metadata, and enqueue the job.
    ///
    /// If the cache insert fails after metadata was written, the metadata is
    /// left in place as an orphan; the preallocated identity is never reused.
    pub async fn submit_job(&self, request: JobRequest) -> Result<JobStatus, EngineError> {
        bulk_validate(&request)?;
        let job = job_of(&request);
        let job = self.lifecycle.assemble_and_validate(job).await?;
        let mut job = self.lifecycle.save_initial_metadata(job).await?;

        // Group children become independent jobs referencing the parent.
        if job.job_type == JobType::JobGroup {
            let mut children = Vec::with_capacity(job.definition.children.len());
            for child_definition in job.definition.children.clone() {
                let mut child = JobState::new(&request.tenant, child_definition, &request.owner);
                child.owner_token = request.owner_token.clone();
                child.parent_key = Some(job.job_key.clone());
                let child = self.lifecycle.assemble_and_validate(child).await?;
                let child = self.lifecycle.save_initial_metadata(child).await?;
                children.push(child);
            }
            job.children = children.iter().filter_map(|c| c.job_id).collect();
            for child in children {
                self.enqueue(child).await?;
            }
        }

        let job = self.enqueue(job).await?;
        Ok(job.status_report())
    }

    /// Current status: cache first, metadata fallback for jobs already
    /// recorded and removed.
    pub async fn check_job(&self, tenant: &str, selector: &TagSelector) -> Result<JobStatus, EngineError> {
        job_selector_check(selector)?;

        if let VersionCriteria::Number(version) = selector.object_version {
            let key = JobKey::new(tenant, selector.object_id, version);
            if let Some(status) = self.cached_status(&key).await? {
                return Ok(status);
            }
        } else {
            // Latest: the store is authoritative for version resolution.
            let tag = self.read_job_tag(tenant, selector).await?;
            let key = tag.header.job_key(tenant);
            if let Some(status) = self.cached_status(&key).await? {
                return Ok(status);
            }
            return Ok(status_from_tag(tenant, &tag));
        }

        let tag = self.read_job_tag(tenant, selector).await?;
        Ok(status_from_tag(tenant, &tag))
    }

    /// Request cancellation. Idempotent: cancelling a terminal job returns
    /// the terminal status unchanged.
    pub async fn cancel_job(&self, tenant: &str, selector: &TagSelector) -> Result<JobStatus, EngineError> {
        job_selector_check(selector)?;

        // Bounded retry against scheduler lease races.
        for _ in 0..3 {
            let current = self.check_job(tenant, selector).await?;
            if current.status_code.is_terminal() || !current.status_code.is_cancellable() {
                return Ok(current);
            }
            let key = current.job_key.clone();
            let Some(entry) = self.ctx.cache.get_entry(&key).await? else {
                continue;
            };
            let job: JobState = match serde_json::from_slice(&entry.value) {
                Ok(job) => job,
                Err(e) => return Err(EngineError::Corrupt(e.to_string())),
            };
            if job.status.is_terminal() {
                return Ok(job.status_report());
            }

            let ticket = match self
                .ctx
                .cache
                .open_ticket(&key, entry.revision, self.ctx.config.lease_duration)
                .await
            {
                Ok(ticket) => ticket,
                Err(e) if e.is_concurrency_loss() => continue,
                Err(e) => return Err(e.into()),
            };

            let cancelled = job.with_status(JobStatusCode::Cancelled, "cancel requested");
            let value = serde_json::to_vec(&cancelled)?;
            let written = self
                .ctx
                .cache
                .update_entry(&ticket, &cancelled.status.to_string(), &value)
                .await;
            self.ctx.cache.close_ticket(&ticket).await;

            match written {
                Ok(_) => {
                    self.hub.publish(cancelled.status_report());
                    if let Err(e) = self.lifecycle.record_update(&cancelled).await {
                        tracing::warn!(job = %key, error = %e, "status mirror failed");
                    }
                    return Ok(cancelled.status_report());
                }
                Err(e) if e.is_concurrency_loss() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StatusError::new(ErrorKind::TransientIo, "job busy, retry cancellation").into())
    }

    /// Stream of status changes: the current status at subscription, then
    /// every change until terminal. No historical replay.
    pub async fn follow_job(
        &self,
        tenant: &str,
        selector: &TagSelector,
    ) -> Result<mpsc::Receiver<JobStatus>, EngineError> {
        let current = self.check_job(tenant, selector).await?;
        let key = current.job_key.clone();
        Ok(self.hub.follow(key, current))
    }

    /// Insert a QUEUED cache entry for a freshly persisted job.
    async fn enqueue(&self, job: JobState) -> Result<JobState, EngineError> {
        let job = job.with_status(JobStatusCode::Queued, "queued for execution");
        let value = serde_json::to_vec(&job)?;

        let ticket = match self
            .ctx
            .cache
            .open_new_ticket(&job.job_key, self.ctx.config.lease_duration)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(job = %job.job_key, error = %e, "cache insert failed; metadata left orphaned");
                return Err(e.into());
            }
        };
        let added = self.ctx.cache.add_entry(&ticket, &job.status.to_string(), &value).await;
        self.ctx.cache.close_ticket(&ticket).await;

        match added {
            Ok(_) => {
                self.hub.publish(job.status_report());
                Ok(job)
            }
            Err(e) => {
                tracing::warn!(job = %job.job_key, error = %e, "cache insert failed; metadata left orphaned");
                Err(e.into())
            }
        }
    }

    async fn cached_status(&self, key: &JobKey) -> Result<Option<JobStatus>, EngineError> {
        let Some(entry) = self.ctx.cache.get_entry(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<JobState>(&entry.value) {
            Ok(job) => Ok(Some(job.status_report())),
            Err(_) => {
                // Entry is quarantined or pending quarantine; report from
                // the status tag alone.
                let code = JobStatusCode::parse(entry.status.as_str())
                    .unwrap_or(JobStatusCode::Failed);
                let job_id = TagHeader::from_job_key(key).map(|(_, header)| header);
                Ok(Some(JobStatus::new(job_id, key.clone(), code, "cache entry unreadable")))
            }
        }
    }

    async fn read_job_tag(
        &self,
        tenant: &str,
        selector: &TagSelector,
    ) -> Result<drover_core::Tag, EngineError> {
        let selector = (*selector).latest_tag();
        Ok(self.ctx.metadata.read_object(tenant, &selector).await?)
    }
}

/// Status report reconstructed from the job tag's mirrored attributes.
fn status_from_tag(tenant: &str, tag: &drover_core::Tag) -> JobStatus {
    let code = tag
        .attr_str(ATTR_JOB_STATUS)
        .and_then(JobStatusCode::parse)
        .unwrap_or(JobStatusCode::Pending);
    let message = tag.attr_str(ATTR_JOB_MESSAGE).unwrap_or_default().to_string();
    JobStatus::new(Some(tag.header), tag.header.job_key(tenant), code, message)
}

fn job_of(request: &JobRequest) -> JobState {
    let mut job = JobState::new(&request.tenant, request.definition.clone(), &request.owner);
    job.owner_token = request.owner_token.clone();
    job.tag_updates = request.tag_updates.clone();
    job
}

fn job_selector_check(selector: &TagSelector) -> Result<(), EngineError> {
    if selector.object_type != ObjectType::Job {
        return Err(StatusError::validation("selector must reference a JOB object").into());
    }
    if !selector.is_well_formed() {
        return Err(StatusError::validation("selector is malformed").into());
    }
    Ok(())
}

/// Field-level validation: required fields, enum ranges, selector shape.
fn bulk_validate(request: &JobRequest) -> Result<(), EngineError> {
    let mut issues = Vec::new();
    if request.tenant.is_empty() {
        issues.push("tenant: must not be empty".to_string());
    }
    if request.owner.is_empty() {
        issues.push("owner: must not be empty".to_string());
    }
    validate_definition_shape(&request.definition, "", &mut issues);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(StatusError::validation(issues.join("; ")).into())
    }
}

fn validate_definition_shape(definition: &JobDefinition, prefix: &str, issues: &mut Vec<String>) {
    let mut selector_checks: Vec<(String, &TagSelector)> = Vec::new();
    if let Some(model) = &definition.model {
        selector_checks.push((format!("{prefix}model"), model));
    }
    if let Some(flow) = &definition.flow {
        selector_checks.push((format!("{prefix}flow"), flow));
    }
    if let Some(storage) = &definition.storage {
        selector_checks.push((format!("{prefix}storage"), storage));
    }
    for (name, selector) in &definition.inputs {
        selector_checks.push((format!("{prefix}inputs.{name}"), selector));
    }
    for (name, selector) in &definition.outputs {
        selector_checks.push((format!("{prefix}outputs.{name}"), selector));
    }
    for (name, selector) in selector_checks {
        if !selector.is_well_formed() {
            issues.push(format!("{name}: selector is malformed"));
        }
    }

    match definition.job_type {
        JobType::ImportModel => match &definition.import {
            None => issues.push(format!("{prefix}import: required for IMPORT_MODEL")),
            Some(details) => {
                for (field, value) in [
                    ("entry_point", &details.entry_point),
                    ("repo", &details.repo),
                    ("version", &details.version),
                ] {
                    if value.is_empty() {
                        issues.push(format!("{prefix}import.{field}: must not be empty"));
                    }
                }
            }
        },
        JobType::RunModel => {
            if definition.model.is_none() {
                issues.push(format!("{prefix}model: required for RUN_MODEL"));
            }
        }
        JobType::RunFlow => {
            if definition.flow.is_none() {
                issues.push(format!("{prefix}flow: required for RUN_FLOW"));
            }
        }
        JobType::ImportData | JobType::ExportData => {
            if definition.storage.is_none() {
                issues.push(format!("{prefix}storage: required for {}", definition.job_type));
            }
        }
        JobType::JobGroup => {
            if definition.children.is_empty() {
                issues.push(format!("{prefix}children: JOB_GROUP requires at least one child"));
            }
            for (index, child) in definition.children.iter().enumerate() {
                validate_definition_shape(child, &format!("{prefix}children[{index}]."), issues);
            }
        }
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
