// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: a cooperative loop driving every in-flight job.
//!
//! Each tick scans the cache for work-pending entries and, per entry:
//! claims a lease at the revision it read, performs the external action
//! under a deadline (outside any lock), folds the outcome back through the
//! processor, and writes the result under the same lease. Conflicts and
//! supersessions are skipped silently — another instance won the job.

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::lifecycle::JobLifecycle;
use crate::monitor::StatusHub;
use crate::processor::{self, Action};
use drover_cache::{CacheEntry, Ticket};
use drover_core::{
    Clock, JobKey, JobState, JobStatusCode, StatusError, TagHeader, TagUpdate, ATTR_JOB_MESSAGE,
    ATTR_JOB_STATUS,
};
use drover_exec::{BatchConfig, BatchState, Feature, RESULT_FILE, RESULT_VOLUME};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result of one scheduler action against a job.
enum Outcome {
    /// Write the updated job back to the cache.
    Update(JobState),
    /// Final state recorded; delete the cache entry.
    Remove(JobState),
}

/// Periodic scanner that drives job state transitions.
pub struct Scheduler<C: Clock> {
    ctx: EngineContext<C>,
    lifecycle: JobLifecycle,
    hub: StatusHub,
    in_flight: Arc<Mutex<HashSet<JobKey>>>,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            lifecycle: self.lifecycle.clone(),
            hub: self.hub.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(ctx: EngineContext<C>, hub: StatusHub) -> Self {
        let lifecycle = JobLifecycle::new(Arc::clone(&ctx.metadata));
        Self { ctx, lifecycle, hub, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.ctx.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler stopping");
                    return;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One scan over the pending set. Returns the number of entries
    /// dispatched. Every dispatched action completes before the tick ends,
    /// so no job can starve the next scan.
    pub async fn tick(&self) -> usize {
        let statuses: Vec<String> =
            JobStatusCode::WORK_PENDING.iter().map(ToString::to_string).collect();
        let status_refs: Vec<&str> = statuses.iter().map(String::as_str).collect();

        let entries = match self.ctx.cache.query_state(&status_refs).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "pending-set query failed");
                return 0;
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.parallelism));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;

        for entry in entries {
            // Per job, at most one action in flight.
            if !self.in_flight.lock().insert(entry.key.clone()) {
                continue;
            }
            dispatched += 1;
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let key = entry.key.clone();
                this.process_entry(entry).await;
                this.in_flight.lock().remove(&key);
            });
        }
        while tasks.join_next().await.is_some() {}
        dispatched
    }

    /// Drive one cache entry through its next transition.
    async fn process_entry(&self, entry: CacheEntry) {
        let job: JobState = match serde_json::from_slice(&entry.value) {
            Ok(job) => job,
            Err(e) => return self.quarantine_corrupt_entry(entry, e).await,
        };

        let now_ms = self.ctx.clock.epoch_ms();
        let Some(action) = processor::next_action(&job, now_ms, self.ctx.config.poll_interval)
        else {
            return;
        };

        let ticket = match self
            .ctx
            .cache
            .open_ticket(&entry.key, entry.revision, self.ctx.config.lease_duration)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) if e.is_concurrency_loss() => {
                tracing::debug!(job = %entry.key, action = action.name(), "skipped: {e}");
                return;
            }
            Err(e) => {
                tracing::warn!(job = %entry.key, action = action.name(), error = %e, "lease failed");
                return;
            }
        };

        tracing::info!(job = %entry.key, action = action.name(), status = %job.status, "executing");
        let started = std::time::Instant::now();
        let deadline = self.ctx.config.operation_deadline;
        let result = match tokio::time::timeout(deadline, self.perform(action, job.clone())).await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::Deadline(deadline)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(outcome) => {
                tracing::info!(job = %entry.key, action = action.name(), elapsed_ms, "completed");
                outcome
            }
            Err(e) if e.kind().is_retryable() => {
                tracing::warn!(job = %entry.key, action = action.name(), elapsed_ms, error = %e, "retryable failure");
                Outcome::Update(processor::apply_transient_failure(
                    job,
                    e.status_message(),
                    self.ctx.config.retry_limit,
                ))
            }
            Err(e) => {
                tracing::error!(job = %entry.key, action = action.name(), elapsed_ms, error = %e, "failed");
                Outcome::Update(processor::apply_terminal_failure(job, e.status_message()))
            }
        };

        self.write_outcome(&ticket, outcome, entry.status.as_str()).await;
        self.ctx.cache.close_ticket(&ticket).await;
    }

    /// Write the action outcome under the lease. A lease lost mid-operation
    /// means the mutation is discarded; the next tick reconciles from
    /// whatever external side-effects actually happened.
    async fn write_outcome(&self, ticket: &Ticket, outcome: Outcome, prior_status: &str) {
        match outcome {
            Outcome::Update(job) => {
                let value = match serde_json::to_vec(&job) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::error!(job = %ticket.key, error = %e, "job state does not serialize");
                        return;
                    }
                };
                let status = job.status.to_string();
                match self.ctx.cache.update_entry(ticket, &status, &value).await {
                    Ok(_) if status != prior_status => {
                        self.hub.publish(job.status_report());
                        // Mirror the transition onto the job tag so status
                        // history survives the cache entry.
                        if let Err(e) = self.lifecycle.record_update(&job).await {
                            tracing::warn!(job = %ticket.key, error = %e, "status mirror failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) if e.is_concurrency_loss() => {
                        tracing::debug!(job = %ticket.key, "mutation discarded: {e}");
                    }
                    Err(e) => {
                        tracing::warn!(job = %ticket.key, error = %e, "cache update failed");
                    }
                }
            }
            Outcome::Remove(job) => match self.ctx.cache.remove_entry(ticket).await {
                Ok(()) => {
                    self.hub.publish(job.status_report());
                }
                Err(e) if e.is_concurrency_loss() => {
                    tracing::debug!(job = %ticket.key, "removal discarded: {e}");
                }
                Err(e) => {
                    tracing::warn!(job = %ticket.key, error = %e, "cache removal failed");
                }
            },
        }
    }

    async fn perform(&self, action: Action, job: JobState) -> Result<Outcome, EngineError> {
        match action {
            Action::Submit => self.submit_batch(job).await,
            Action::Poll => self.poll_batch(job).await,
            Action::PollGroup => self.poll_group(job).await,
            Action::FetchResult => self.fetch_result(job).await,
            Action::Finalize => self.finalize(job, false).await,
            Action::CancelAndFinalize => self.finalize(job, true).await,
        }
    }

    /// Stage config files into a fresh batch workspace and submit it.
    async fn submit_batch(&self, mut job: JobState) -> Result<Outcome, EngineError> {
        let executor = self.ctx.executor()?;

        let job_config = job_config_document(&job);
        let sys_config = sys_config_document(&job);
        job.job_config = Some(job_config.clone());
        job.sys_config = Some(sys_config.clone());

        let state = executor.create_batch(job.job_key.as_str()).await?;
        let state = executor.add_volume(&state, "config").await?;
        let state = executor
            .add_file(&state, "config", "job_config.json", serde_json::to_vec(&job_config)?)
            .await?;
        let mut state = executor
            .add_file(&state, "config", "sys_config.json", serde_json::to_vec(&sys_config)?)
            .await?;

        for tag in job.resources.values() {
            if let drover_core::ObjectDefinition::Storage(storage) = &tag.definition {
                state = executor.configure_batch_storage(&state, storage).await?;
            }
        }

        let state = executor
            .submit_batch(&state, BatchConfig { job_config, sys_config })
            .await?;
        Ok(Outcome::Update(processor::apply_submit(job, state.into_bytes())))
    }

    async fn poll_batch(&self, job: JobState) -> Result<Outcome, EngineError> {
        let executor = self.ctx.executor()?;
        let state = executor_state(&job)?;
        let status = executor.batch_status(&state).await?;
        let now_ms = self.ctx.clock.epoch_ms();
        Ok(Outcome::Update(processor::apply_poll(job, &status, now_ms)))
    }

    async fn fetch_result(&self, job: JobState) -> Result<Outcome, EngineError> {
        let executor = self.ctx.executor()?;
        let state = executor_state(&job)?;
        if !executor.has_output_file(&state, RESULT_VOLUME, RESULT_FILE).await? {
            return Err(drover_exec::ExecutorError::MissingOutput(format!(
                "{RESULT_VOLUME}/{RESULT_FILE}"
            ))
            .into());
        }
        let document = executor.get_output_file(&state, RESULT_VOLUME, RESULT_FILE).await?;
        Ok(Outcome::Update(processor::apply_fetch(job, document)))
    }

    /// Gather child statuses for a group parent: cache first, metadata for
    /// children already recorded and removed.
    async fn poll_group(&self, job: JobState) -> Result<Outcome, EngineError> {
        let mut statuses = Vec::with_capacity(job.children.len());
        for child in &job.children {
            let key = child.job_key(&job.tenant);
            let status = match self.ctx.cache.get_entry(&key).await? {
                Some(entry) => JobStatusCode::parse(entry.status.as_str())
                    .unwrap_or(JobStatusCode::Failed),
                None => {
                    let selector = child.selector().latest_tag();
                    let tag = self.ctx.metadata.read_object(&job.tenant, &selector).await?;
                    tag.attr_str(ATTR_JOB_STATUS)
                        .and_then(JobStatusCode::parse)
                        .unwrap_or(JobStatusCode::Failed)
                }
            };
            statuses.push(status);
        }
        let now_ms = self.ctx.clock.epoch_ms();
        Ok(Outcome::Update(processor::apply_group_progress(job, &statuses, now_ms)))
    }

    /// Terminal path: cancel if asked, stage and record the result, clean up
    /// the batch, and signal removal. Retries land on the same preallocated
    /// identities, so replays are idempotent.
    async fn finalize(&self, mut job: JobState, cancel: bool) -> Result<Outcome, EngineError> {
        if cancel {
            if let Some(bytes) = &job.executor_state {
                let executor = self.ctx.executor()?;
                if executor.has_feature(Feature::Cancellation) {
                    let state = executor.cancel_batch(&BatchState::from_bytes(bytes.clone())).await?;
                    job.executor_state = Some(state.into_bytes());
                }
            }
        }

        let job = self.lifecycle.process_result(job).await?;
        if let Err(e) = self.lifecycle.record_result(&job).await {
            if !e.kind().is_retryable() {
                return Err(e);
            }
            // Keep the staged result mapping: the retry must land on the
            // same preallocated identities.
            tracing::warn!(job = %job.job_key, error = %e, "result recording failed, will retry");
            return Ok(Outcome::Update(processor::apply_transient_failure(
                job,
                e.status_message(),
                self.ctx.config.retry_limit,
            )));
        }

        // The result is durable; batch cleanup is best-effort.
        if let Some(bytes) = &job.executor_state {
            if let Ok(executor) = self.ctx.executor() {
                let state = BatchState::from_bytes(bytes.clone());
                if let Err(e) = executor.delete_batch(&state).await {
                    tracing::warn!(job = %job.job_key, error = %e, "batch cleanup failed");
                }
            }
        }
        Ok(Outcome::Remove(job))
    }

    /// A cache entry that no longer deserializes. First pass marks it FAILED
    /// with the original bytes preserved for diagnostics; second pass records
    /// the failure against the job tag and removes the entry.
    async fn quarantine_corrupt_entry(&self, entry: CacheEntry, error: serde_json::Error) {
        tracing::error!(
            job = %entry.key,
            size = entry.value.len(),
            error = %error,
            "CACHE_CORRUPTION: entry does not deserialize"
        );
        let failed = JobStatusCode::Failed.to_string();

        let ticket = match self
            .ctx
            .cache
            .open_ticket(&entry.key, entry.revision, self.ctx.config.lease_duration)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::debug!(job = %entry.key, "corrupt entry skipped: {e}");
                return;
            }
        };

        if entry.status.as_str() != failed {
            // Preserve the original value; only the status tag changes.
            if let Err(e) = self.ctx.cache.update_entry(&ticket, &failed, &entry.value).await {
                tracing::debug!(job = %entry.key, "quarantine discarded: {e}");
            }
            self.ctx.cache.close_ticket(&ticket).await;
            return;
        }

        // Already quarantined: record the failure, then drop the entry.
        let recorded = match TagHeader::from_job_key(&entry.key) {
            Some((tenant, header)) => {
                let selector = header.selector().latest_tag();
                let attrs = vec![
                    TagUpdate::new(ATTR_JOB_STATUS, failed),
                    TagUpdate::new(ATTR_JOB_MESSAGE, "CACHE_CORRUPTION: cache entry unreadable"),
                ];
                self.ctx.metadata.update_tag(&tenant, &selector, attrs).await.map(|_| ())
            }
            None => Err(drover_metadata::MetadataError::NotFound(format!(
                "job key {} does not decode",
                entry.key
            ))),
        };
        match recorded {
            Ok(()) => {
                if let Err(e) = self.ctx.cache.remove_entry(&ticket).await {
                    tracing::debug!(job = %entry.key, "removal discarded: {e}");
                }
            }
            Err(e) => {
                tracing::error!(job = %entry.key, error = %e, "corrupt entry could not be recorded");
            }
        }
        self.ctx.cache.close_ticket(&ticket).await;
    }
}

fn executor_state(job: &JobState) -> Result<BatchState, EngineError> {
    job.executor_state
        .as_ref()
        .map(|bytes| BatchState::from_bytes(bytes.clone()))
        .ok_or_else(|| StatusError::internal("executor state missing").into())
}

/// The job config document handed to the model runtime.
fn job_config_document(job: &JobState) -> serde_json::Value {
    serde_json::json!({
        "job_key": job.job_key.as_str(),
        "job_type": job.job_type,
        "definition": job.definition,
        "resources": job.resource_mapping,
    })
}

/// The platform config document handed to the model runtime.
fn sys_config_document(job: &JobState) -> serde_json::Value {
    serde_json::json!({
        "tenant": job.tenant,
        "owner": job.owner,
    })
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
