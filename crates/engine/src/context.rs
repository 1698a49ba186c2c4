// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine context: collaborators and configuration, threaded through
//! the API, lifecycle and scheduler instead of living in process globals.

use crate::error::EngineError;
use drover_cache::JobCache;
use drover_core::{Clock, OrchestratorConfig, StatusError};
use drover_exec::{BatchExecutor, ExecutorRegistry};
use drover_metadata::MetadataClient;
use std::sync::Arc;

/// Everything a component needs to act on jobs.
pub struct EngineContext<C: Clock> {
    pub metadata: Arc<dyn MetadataClient>,
    pub cache: Arc<dyn JobCache>,
    pub executors: Arc<ExecutorRegistry>,
    pub config: OrchestratorConfig,
    pub clock: C,
}

impl<C: Clock> Clone for EngineContext<C> {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
            cache: Arc::clone(&self.cache),
            executors: Arc::clone(&self.executors),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> EngineContext<C> {
    pub fn new(
        metadata: Arc<dyn MetadataClient>,
        cache: Arc<dyn JobCache>,
        executors: Arc<ExecutorRegistry>,
        config: OrchestratorConfig,
        clock: C,
    ) -> Result<Self, StatusError> {
        config.validate()?;
        Ok(Self { metadata, cache, executors, config, clock })
    }

    /// The executor selected by configuration.
    pub fn executor(&self) -> Result<Arc<dyn BatchExecutor>, EngineError> {
        Ok(self.executors.get(&self.config.executor)?)
    }
}
