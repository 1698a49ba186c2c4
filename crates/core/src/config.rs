// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator tuning knobs.

use crate::error::StatusError;
use std::time::Duration;

/// Timing and retry configuration for the scheduler and cache leases.
///
/// Invariant: `lease_duration` must exceed `operation_deadline`, so an
/// external call either finishes or times out while the lease still holds.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a cache lease is held before it becomes reclaimable.
    pub lease_duration: Duration,
    /// Minimum spacing between executor polls for one job.
    pub poll_interval: Duration,
    /// Deadline applied to every external call the scheduler makes.
    pub operation_deadline: Duration,
    /// Transient failures tolerated per status before the job fails.
    pub retry_limit: u32,
    /// Spacing between scheduler ticks.
    pub tick_interval: Duration,
    /// Jobs processed concurrently within one tick.
    pub parallelism: usize,
    /// Executor protocol selected from the registry.
    pub executor: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            operation_deadline: Duration::from_secs(20),
            retry_limit: 3,
            tick_interval: Duration::from_secs(1),
            parallelism: 4,
            executor: "local".to_string(),
        }
    }
}

impl OrchestratorConfig {
    crate::setters! {
        into {
            executor: String,
        }
        set {
            lease_duration: Duration,
            poll_interval: Duration,
            operation_deadline: Duration,
            retry_limit: u32,
            tick_interval: Duration,
            parallelism: usize,
        }
    }

    /// Check the cross-field invariants.
    pub fn validate(&self) -> Result<(), StatusError> {
        if self.lease_duration <= self.operation_deadline {
            return Err(StatusError::internal(format!(
                "lease duration {:?} must exceed operation deadline {:?}",
                self.lease_duration, self.operation_deadline
            )));
        }
        if self.parallelism == 0 {
            return Err(StatusError::internal("parallelism must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
