// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type, folding collaborator errors into one taxonomy.

use drover_cache::CacheError;
use drover_core::{ErrorKind, StatusError};
use drover_exec::ExecutorError;
use drover_metadata::MetadataError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while orchestrating a job.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Status(#[from] StatusError),
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("executor: {0}")]
    Executor(#[from] ExecutorError),
    #[error("operation deadline exceeded after {0:?}")]
    Deadline(Duration),
    #[error("stored job state does not deserialize: {0}")]
    Corrupt(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Status(e) => e.kind,
            EngineError::Metadata(e) => e.kind(),
            EngineError::Cache(e) => e.kind(),
            EngineError::Executor(e) => e.kind(),
            EngineError::Deadline(_) => ErrorKind::TransientIo,
            EngineError::Corrupt(_) => ErrorKind::CacheCorruption,
        }
    }

    /// Message recorded on the job when this error becomes its status.
    pub fn status_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Status(StatusError::internal(format!("serialization failed: {e}")))
    }
}
