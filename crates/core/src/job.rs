// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state: an immutable execution request plus its evolving status.

use crate::id::JobKey;
use crate::meta::{Tag, TagHeader, TagUpdate};
use crate::object::{JobDefinition, ObjectDefinition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    #[default]
    ImportModel,
    RunModel,
    RunFlow,
    ImportData,
    ExportData,
    JobGroup,
}

crate::simple_display! {
    JobType {
        ImportModel => "IMPORT_MODEL",
        RunModel => "RUN_MODEL",
        RunFlow => "RUN_FLOW",
        ImportData => "IMPORT_DATA",
        ExportData => "EXPORT_DATA",
        JobGroup => "JOB_GROUP",
    }
}

/// Finite job status. See the transition rules in the engine processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatusCode {
    /// Pre-persist, visible only inside the job API.
    Pending,
    /// Validation passed; nothing was persisted.
    Validated,
    /// In cache, awaiting the scheduler.
    Queued,
    /// Accepted by the executor.
    Submitted,
    /// Executor reports in-progress.
    Running,
    /// Executor finished; result being fetched.
    Finishing,
    Succeeded,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobStatusCode {
        Pending => "PENDING",
        Validated => "VALIDATED",
        Queued => "QUEUED",
        Submitted => "SUBMITTED",
        Running => "RUNNING",
        Finishing => "FINISHING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

impl JobStatusCode {
    /// Statuses the scheduler has work to do for, in scan order.
    pub const WORK_PENDING: [JobStatusCode; 7] = [
        JobStatusCode::Queued,
        JobStatusCode::Submitted,
        JobStatusCode::Running,
        JobStatusCode::Finishing,
        JobStatusCode::Succeeded,
        JobStatusCode::Failed,
        JobStatusCode::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatusCode::Succeeded | JobStatusCode::Failed | JobStatusCode::Cancelled)
    }

    /// Statuses that may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobStatusCode::Queued | JobStatusCode::Submitted | JobStatusCode::Running | JobStatusCode::Finishing
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatusCode::Pending),
            "VALIDATED" => Some(JobStatusCode::Validated),
            "QUEUED" => Some(JobStatusCode::Queued),
            "SUBMITTED" => Some(JobStatusCode::Submitted),
            "RUNNING" => Some(JobStatusCode::Running),
            "FINISHING" => Some(JobStatusCode::Finishing),
            "SUCCEEDED" => Some(JobStatusCode::Succeeded),
            "FAILED" => Some(JobStatusCode::Failed),
            "CANCELLED" => Some(JobStatusCode::Cancelled),
            _ => None,
        }
    }
}

/// Status report surfaced through the job API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Option<TagHeader>,
    pub job_key: JobKey,
    pub status_code: JobStatusCode,
    pub status_message: String,
}

impl JobStatus {
    pub fn new(
        job_id: Option<TagHeader>,
        job_key: JobKey,
        status_code: JobStatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self { job_id, job_key, status_code, status_message: message.into() }
    }
}

/// Result document produced by the model runtime, fetched from the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status_code: JobStatusCode,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Definitions of produced objects, by output name.
    #[serde(default)]
    pub outputs: IndexMap<String, ObjectDefinition>,
}

/// An output object staged for the final batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultObject {
    pub header: TagHeader,
    pub definition: ObjectDefinition,
    #[serde(default)]
    pub attrs: Vec<TagUpdate>,
}

/// An in-flight job: the request plus everything the orchestrator has
/// learned or produced so far. Serialized whole into the cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub tenant: String,
    /// Allocated on first metadata write; absent while PENDING.
    pub job_id: Option<TagHeader>,
    pub job_key: JobKey,
    pub job_type: JobType,
    pub definition: JobDefinition,
    pub status: JobStatusCode,
    #[serde(default)]
    pub status_message: String,
    /// Resolved metadata objects, keyed by object key.
    #[serde(default)]
    pub resources: HashMap<String, Tag>,
    /// Logical name (model, input:x, output:x, node:n) to resolved header.
    #[serde(default)]
    pub resource_mapping: HashMap<String, TagHeader>,
    /// Output name to preallocated result object header.
    #[serde(default)]
    pub result_mapping: IndexMap<String, TagHeader>,
    /// Output objects staged by result processing.
    #[serde(default)]
    pub result_objects: Vec<ResultObject>,
    /// Serialized platform config handed to the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys_config: Option<serde_json::Value>,
    /// Serialized job config handed to the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_config: Option<serde_json::Value>,
    /// Raw result document fetched from the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_result: Option<Vec<u8>>,
    /// Opaque executor plugin state. Never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_state: Option<Vec<u8>>,
    pub owner: String,
    /// Delegated credentials for downstream calls on behalf of the owner.
    #[serde(default)]
    pub owner_token: String,
    /// Caller-supplied tag updates applied to the job tag.
    #[serde(default)]
    pub tag_updates: Vec<TagUpdate>,
    /// Cache key of the parent group job, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<JobKey>,
    /// Headers of child jobs, for JOB_GROUP parents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TagHeader>,
    /// Transient-failure retries spent in the current status.
    #[serde(default)]
    pub retries: u32,
    /// Epoch ms of the last executor poll, for poll-interval throttling.
    #[serde(default)]
    pub last_poll_ms: u64,
}

impl JobState {
    /// A fresh PENDING job for the given request.
    pub fn new(tenant: impl Into<String>, definition: JobDefinition, owner: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            job_id: None,
            job_key: JobKey::default(),
            job_type: definition.job_type,
            definition,
            status: JobStatusCode::Pending,
            status_message: String::new(),
            resources: HashMap::new(),
            resource_mapping: HashMap::new(),
            result_mapping: IndexMap::new(),
            result_objects: Vec::new(),
            sys_config: None,
            job_config: None,
            job_result: None,
            executor_state: None,
            owner: owner.into(),
            owner_token: String::new(),
            tag_updates: Vec::new(),
            parent_key: None,
            children: Vec::new(),
            retries: 0,
            last_poll_ms: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to a new status, replacing the status message.
    pub fn with_status(mut self, status: JobStatusCode, message: impl Into<String>) -> Self {
        self.status = status;
        self.status_message = message.into();
        self
    }

    /// Status report for this job.
    pub fn status_report(&self) -> JobStatus {
        JobStatus {
            job_id: self.job_id,
            job_key: self.job_key.clone(),
            status_code: self.status,
            status_message: self.status_message.clone(),
        }
    }

    /// The request fields only, with every evolving field reset.
    ///
    /// Two jobs with equal request views carry the same immutable request;
    /// lifecycle stages must keep this view unchanged.
    pub fn request_view(&self) -> JobState {
        let mut view = JobState::new(self.tenant.clone(), self.definition.clone(), self.owner.clone());
        view.owner_token = self.owner_token.clone();
        view.tag_updates = self.tag_updates.clone();
        view.parent_key = self.parent_key.clone();
        view
    }
}

crate::builder! {
    pub struct JobStateBuilder => JobState {
        into {
            tenant: String = "acme",
            job_key: JobKey = "",
            owner: String = "tester",
            owner_token: String = "",
            status_message: String = "",
        }
        set {
            job_type: JobType = JobType::ImportModel,
            definition: JobDefinition = JobDefinition::default(),
            status: JobStatusCode = JobStatusCode::Pending,
            resources: HashMap<String, Tag> = HashMap::new(),
            resource_mapping: HashMap<String, TagHeader> = HashMap::new(),
            result_mapping: IndexMap<String, TagHeader> = IndexMap::new(),
            result_objects: Vec<ResultObject> = Vec::new(),
            tag_updates: Vec<TagUpdate> = Vec::new(),
            children: Vec<TagHeader> = Vec::new(),
            retries: u32 = 0,
            last_poll_ms: u64 = 0,
        }
        option {
            job_id: TagHeader = None,
            sys_config: serde_json::Value = None,
            job_config: serde_json::Value = None,
            job_result: Vec<u8> = None,
            executor_state: Vec<u8> = None,
            parent_key: JobKey = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
