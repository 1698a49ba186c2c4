// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-exec: the pluggable batch executor capability.
//!
//! An executor launches, polls, cancels and retrieves outputs from a batch
//! process. The orchestrator only ever holds an opaque [`BatchState`];
//! plugins own the encoding inside it (see [`state`]).

pub mod registry;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod stub;

pub use registry::ExecutorRegistry;

/// Volume the model runtime writes its result document into.
pub const RESULT_VOLUME: &str = "result";
/// File name of the result document inside [`RESULT_VOLUME`].
pub const RESULT_FILE: &str = "job_result.json";

use async_trait::async_trait;
use drover_core::{ErrorKind, StorageDefinition};
use thiserror::Error;

/// Opaque, serializable executor plugin state.
///
/// The orchestrator stores these bytes in the cache entry and hands them
/// back on the next call; it never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchState(Vec<u8>);

impl BatchState {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Executor-level status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatusCode {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

drover_core::simple_display! {
    BatchStatusCode {
        Queued => "QUEUED",
        Running => "RUNNING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
    }
}

impl BatchStatusCode {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatusCode::Succeeded | BatchStatusCode::Failed | BatchStatusCode::Cancelled
        )
    }
}

/// Status report from [`BatchExecutor::batch_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatus {
    pub code: BatchStatusCode,
    pub exit_code: Option<i32>,
    pub message: String,
}

impl BatchStatus {
    pub fn new(code: BatchStatusCode) -> Self {
        Self { code, exit_code: None, message: String::new() }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Optional executor capabilities, probed before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Cancellation,
    Streaming,
    RemoteExec,
}

/// Serialized payloads handed to the batch at submit time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchConfig {
    pub job_config: serde_json::Value,
    pub sys_config: serde_json::Value,
}

/// Errors raised by executor plugins.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor rejected or lost the batch. Terminal for the job.
    #[error("executor rejected batch: {0}")]
    Rejected(String),
    /// Transport or backend failure worth retrying.
    #[error("executor unavailable: {0}")]
    Unavailable(String),
    /// The opaque state bytes do not decode.
    #[error("corrupt executor state: {0}")]
    CorruptState(String),
    /// A requested output file does not exist in the batch workspace.
    #[error("missing batch output: {0}")]
    MissingOutput(String),
    /// No executor registered under the protocol name.
    #[error("unknown executor protocol: {0}")]
    UnknownProtocol(String),
}

impl ExecutorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Rejected(_) => ErrorKind::ExecutorFailed,
            ExecutorError::Unavailable(_) => ErrorKind::TransientIo,
            ExecutorError::CorruptState(_) => ErrorKind::ExecutorFailed,
            ExecutorError::MissingOutput(_) => ErrorKind::ExecutorFailed,
            ExecutorError::UnknownProtocol(_) => ErrorKind::Internal,
        }
    }
}

/// Capability set every batch executor backend provides.
///
/// Implementations must tolerate repeated calls: `cancel_batch` on a batch
/// that already reached a terminal status is a no-op, and `batch_status` on
/// a deleted batch reports a synthetic terminal failure rather than an error.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    /// Create an isolated workspace for a batch. `batch_key` is derived from
    /// the job key and identifies the batch across calls.
    async fn create_batch(&self, batch_key: &str) -> Result<BatchState, ExecutorError>;

    /// Declare a named volume inside the batch workspace.
    async fn add_volume(&self, state: &BatchState, volume: &str) -> Result<BatchState, ExecutorError>;

    /// Stage an input file into a volume.
    async fn add_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<BatchState, ExecutorError>;

    /// Launch the batch.
    async fn submit_batch(
        &self,
        state: &BatchState,
        config: BatchConfig,
    ) -> Result<BatchState, ExecutorError>;

    /// Request termination. No-op for batches already terminal.
    async fn cancel_batch(&self, state: &BatchState) -> Result<BatchState, ExecutorError>;

    /// Discard the batch workspace.
    async fn delete_batch(&self, state: &BatchState) -> Result<(), ExecutorError>;

    /// Current status. Deleted batches report a synthetic terminal failure.
    async fn batch_status(&self, state: &BatchState) -> Result<BatchStatus, ExecutorError>;

    async fn has_output_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
    ) -> Result<bool, ExecutorError>;

    async fn get_output_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
    ) -> Result<Vec<u8>, ExecutorError>;

    /// Bind a storage location into the batch workspace.
    async fn configure_batch_storage(
        &self,
        state: &BatchState,
        storage: &StorageDefinition,
    ) -> Result<BatchState, ExecutorError>;

    /// Probe an optional capability.
    fn has_feature(&self, feature: Feature) -> bool;
}
