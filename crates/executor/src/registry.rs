// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name registry of executor backends.
//!
//! Configuration selects a backend by protocol name; nothing in the engine
//! links against a concrete implementation.

use crate::{BatchExecutor, ExecutorError};
use std::collections::HashMap;
use std::sync::Arc;

/// Protocol name → executor implementation.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn BatchExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under a protocol name. Last registration wins.
    pub fn register(&mut self, protocol: impl Into<String>, executor: Arc<dyn BatchExecutor>) {
        let protocol = protocol.into();
        tracing::debug!(protocol = %protocol, "executor registered");
        self.executors.insert(protocol, executor);
    }

    pub fn get(&self, protocol: &str) -> Result<Arc<dyn BatchExecutor>, ExecutorError> {
        self.executors
            .get(protocol)
            .cloned()
            .ok_or_else(|| ExecutorError::UnknownProtocol(protocol.to_string()))
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
