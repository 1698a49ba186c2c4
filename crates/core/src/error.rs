// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the orchestrator.
//!
//! Every crate-level error maps into one [`ErrorKind`]; the scheduler
//! decides retry behavior from the kind alone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input malformed or semantically inconsistent. Never retried.
    ValidationFailed,
    /// Caller lacks permission. Never retried.
    AuthorizationDenied,
    /// Referenced selector or job absent.
    NotFound,
    /// Duplicate creation.
    AlreadyExists,
    /// Optimistic-concurrency loss on the cache. Handled silently.
    Superseded,
    /// Another holder owns the lease. Handled silently.
    LeaseConflict,
    /// Metadata or executor call failed with a retryable cause.
    TransientIo,
    /// The batch returned a non-zero status or corrupt result. Terminal.
    ExecutorFailed,
    /// A stored cache entry cannot be deserialized.
    CacheCorruption,
    /// Catch-all; logged at error level, terminal.
    Internal,
}

crate::simple_display! {
    ErrorKind {
        ValidationFailed => "VALIDATION_FAILED",
        AuthorizationDenied => "AUTHORIZATION_DENIED",
        NotFound => "NOT_FOUND",
        AlreadyExists => "ALREADY_EXISTS",
        Superseded => "SUPERSEDED",
        LeaseConflict => "LEASE_CONFLICT",
        TransientIo => "TRANSIENT_IO",
        ExecutorFailed => "EXECUTOR_FAILED",
        CacheCorruption => "CACHE_CORRUPTION",
        Internal => "INTERNAL",
    }
}

impl ErrorKind {
    /// Whether the scheduler should retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientIo)
    }

    /// Concurrency losses are skipped silently; callers never see them.
    pub fn is_concurrency_loss(&self) -> bool {
        matches!(self, ErrorKind::Superseded | ErrorKind::LeaseConflict)
    }
}

/// A classified error with a human-readable message.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct StatusError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StatusError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
