// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-core: shared types for the Drover orchestrator.
//!
//! Identity, tags and selectors, object definitions, job state, the error
//! taxonomy, timing configuration, and the injected clock.

pub mod macros;

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod job;
pub mod meta;
pub mod object;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::OrchestratorConfig;
pub use error::{ErrorKind, StatusError};
pub use id::{JobKey, ObjectId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobStateBuilder;
pub use job::{JobResult, JobState, JobStatus, JobStatusCode, JobType, ResultObject};
pub use meta::{
    AttrValue, ObjectType, Tag, TagHeader, TagSelector, TagUpdate, VersionCriteria,
    ATTR_CREATE_TIME, ATTR_JOB_MESSAGE, ATTR_JOB_OWNER, ATTR_JOB_STATUS, ATTR_OUTPUT_NAME,
    ATTR_PARENT_JOB, ATTR_SOURCE_JOB,
};
pub use object::{
    BasicType, DataDefinition, FieldSchema, FlowDefinition, FlowNode, ImportDetails,
    JobDefinition, ModelDefinition, ModelPort, ObjectDefinition, ParamSpec, ResultDefinition,
    SchemaDefinition, StorageDefinition, TableSchema,
};
