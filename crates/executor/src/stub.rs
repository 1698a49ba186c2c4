// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory executor for tests.
//!
//! Each batch walks a status script, one step per poll, and exposes a canned
//! result document once it succeeds. Failures can be injected at submit time
//! or through the script itself.

use crate::state::{decode_state, encode_state};
use crate::{
    BatchConfig, BatchExecutor, BatchState, BatchStatus, BatchStatusCode, ExecutorError, Feature,
    RESULT_FILE, RESULT_VOLUME,
};
use async_trait::async_trait;
use drover_core::StorageDefinition;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const PROTOCOL: &str = "stub";

#[derive(Debug, Clone)]
struct StubBatch {
    status: BatchStatus,
    script: VecDeque<BatchStatus>,
    files: HashMap<(String, String), Vec<u8>>,
    outputs: HashMap<(String, String), Vec<u8>>,
    submitted: bool,
}

#[derive(Default)]
struct Inner {
    batches: HashMap<String, StubBatch>,
    /// Batches that received an effective cancel, surviving deletion.
    cancelled: std::collections::HashSet<String>,
    script: Vec<BatchStatus>,
    result_document: Option<Vec<u8>>,
    submit_failures: u32,
    poll_failures: u32,
    poll_delay: Option<std::time::Duration>,
    calls: Vec<String>,
}

/// Scripted [`BatchExecutor`] backend.
#[derive(Clone, Default)]
pub struct StubExecutor {
    inner: Arc<Mutex<Inner>>,
    cancellation: bool,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())), cancellation: true }
    }

    /// Status sequence new batches walk, one step per poll. The last entry
    /// repeats once the script runs out.
    pub fn with_script(self, script: Vec<BatchStatus>) -> Self {
        self.inner.lock().script = script;
        self
    }

    /// Result document exposed once a batch succeeds.
    pub fn with_result_document(self, bytes: Vec<u8>) -> Self {
        self.inner.lock().result_document = Some(bytes);
        self
    }

    /// Make the next `n` submits fail with `Unavailable`.
    pub fn fail_submits(&self, n: u32) {
        self.inner.lock().submit_failures = n;
    }

    /// Make the next `n` polls fail with `Unavailable`.
    pub fn fail_polls(&self, n: u32) {
        self.inner.lock().poll_failures = n;
    }

    /// Stall every poll, for exercising operation deadlines.
    pub fn set_poll_delay(&self, delay: std::time::Duration) {
        self.inner.lock().poll_delay = Some(delay);
    }

    /// Drop the cancellation capability.
    pub fn without_cancellation(mut self) -> Self {
        self.cancellation = false;
        self
    }

    /// Every call made so far, as `op:batch_key` strings.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    /// Whether a cancel reached the given batch.
    pub fn was_cancelled(&self, batch_key: &str) -> bool {
        self.inner.lock().cancelled.contains(batch_key)
    }

    /// Whether the batch workspace still exists.
    pub fn batch_exists(&self, batch_key: &str) -> bool {
        self.inner.lock().batches.contains_key(batch_key)
    }

    /// An input file previously staged with `add_file`.
    pub fn staged_file(&self, batch_key: &str, volume: &str, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .batches
            .get(batch_key)
            .and_then(|b| b.files.get(&(volume.to_string(), name.to_string())))
            .cloned()
    }

    fn state_for(key: &str) -> BatchState {
        BatchState::from_bytes(encode_state(PROTOCOL, key.as_bytes()))
    }

    fn key_of(state: &BatchState) -> Result<String, ExecutorError> {
        let (protocol, payload) = decode_state(state.as_bytes())?;
        if protocol != PROTOCOL {
            return Err(ExecutorError::CorruptState(format!(
                "state belongs to protocol {protocol}"
            )));
        }
        String::from_utf8(payload)
            .map_err(|_| ExecutorError::CorruptState("batch key is not UTF-8".to_string()))
    }

    fn default_script() -> Vec<BatchStatus> {
        vec![
            BatchStatus::new(BatchStatusCode::Running),
            BatchStatus::new(BatchStatusCode::Succeeded).with_exit_code(0),
        ]
    }
}

#[async_trait]
impl BatchExecutor for StubExecutor {
    async fn create_batch(&self, batch_key: &str) -> Result<BatchState, ExecutorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("create:{batch_key}"));
        let script = if inner.script.is_empty() {
            Self::default_script()
        } else {
            inner.script.clone()
        };
        inner.batches.insert(
            batch_key.to_string(),
            StubBatch {
                status: BatchStatus::new(BatchStatusCode::Queued),
                script: script.into(),
                files: HashMap::new(),
                outputs: HashMap::new(),
                submitted: false,
            },
        );
        Ok(Self::state_for(batch_key))
    }

    async fn add_volume(&self, state: &BatchState, volume: &str) -> Result<BatchState, ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        if !inner.batches.contains_key(&key) {
            return Err(ExecutorError::Rejected(format!("no batch {key}")));
        }
        inner.calls.push(format!("volume:{key}:{volume}"));
        Ok(state.clone())
    }

    async fn add_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<BatchState, ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        let batch = inner
            .batches
            .get_mut(&key)
            .ok_or_else(|| ExecutorError::Rejected(format!("no batch {key}")))?;
        batch.files.insert((volume.to_string(), name.to_string()), content);
        Ok(state.clone())
    }

    async fn submit_batch(
        &self,
        state: &BatchState,
        _config: BatchConfig,
    ) -> Result<BatchState, ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        inner.calls.push(format!("submit:{key}"));
        if inner.submit_failures > 0 {
            inner.submit_failures -= 1;
            return Err(ExecutorError::Unavailable("injected submit failure".to_string()));
        }
        let batch = inner
            .batches
            .get_mut(&key)
            .ok_or_else(|| ExecutorError::Rejected(format!("no batch {key}")))?;
        batch.submitted = true;
        batch.status = BatchStatus::new(BatchStatusCode::Queued);
        Ok(state.clone())
    }

    async fn cancel_batch(&self, state: &BatchState) -> Result<BatchState, ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        inner.calls.push(format!("cancel:{key}"));
        let mut took_effect = false;
        if let Some(batch) = inner.batches.get_mut(&key) {
            // Cancelling a terminal batch is a no-op.
            if !batch.status.code.is_terminal() {
                batch.status =
                    BatchStatus::new(BatchStatusCode::Cancelled).with_message("cancelled");
                batch.script.clear();
                took_effect = true;
            }
        }
        if took_effect {
            inner.cancelled.insert(key);
        }
        Ok(state.clone())
    }

    async fn delete_batch(&self, state: &BatchState) -> Result<(), ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        inner.calls.push(format!("delete:{key}"));
        inner.batches.remove(&key);
        Ok(())
    }

    async fn batch_status(&self, state: &BatchState) -> Result<BatchStatus, ExecutorError> {
        let key = Self::key_of(state)?;
        let delay = self.inner.lock().poll_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock();
        inner.calls.push(format!("poll:{key}"));
        if inner.poll_failures > 0 {
            inner.poll_failures -= 1;
            return Err(ExecutorError::Unavailable("injected poll failure".to_string()));
        }
        let result_document = inner.result_document.clone();
        let Some(batch) = inner.batches.get_mut(&key) else {
            // Deleted batches report a synthetic terminal status.
            return Ok(BatchStatus::new(BatchStatusCode::Failed)
                .with_message(format!("batch {key} no longer exists")));
        };
        if !batch.submitted {
            return Ok(batch.status.clone());
        }
        if let Some(next) = batch.script.pop_front() {
            batch.status = next;
        }
        if batch.status.code == BatchStatusCode::Succeeded {
            let document = result_document.unwrap_or_default();
            batch
                .outputs
                .insert((RESULT_VOLUME.to_string(), RESULT_FILE.to_string()), document);
        }
        Ok(batch.status.clone())
    }

    async fn has_output_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
    ) -> Result<bool, ExecutorError> {
        let key = Self::key_of(state)?;
        let inner = self.inner.lock();
        Ok(inner
            .batches
            .get(&key)
            .is_some_and(|b| b.outputs.contains_key(&(volume.to_string(), name.to_string()))))
    }

    async fn get_output_file(
        &self,
        state: &BatchState,
        volume: &str,
        name: &str,
    ) -> Result<Vec<u8>, ExecutorError> {
        let key = Self::key_of(state)?;
        let inner = self.inner.lock();
        inner
            .batches
            .get(&key)
            .and_then(|b| b.outputs.get(&(volume.to_string(), name.to_string())))
            .cloned()
            .ok_or_else(|| ExecutorError::MissingOutput(format!("{volume}/{name} in batch {key}")))
    }

    async fn configure_batch_storage(
        &self,
        state: &BatchState,
        storage: &StorageDefinition,
    ) -> Result<BatchState, ExecutorError> {
        let key = Self::key_of(state)?;
        let mut inner = self.inner.lock();
        inner.calls.push(format!("storage:{key}:{}", storage.protocol));
        Ok(state.clone())
    }

    fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::Cancellation => self.cancellation,
            Feature::Streaming | Feature::RemoteExec => false,
        }
    }
}

#[cfg(test)]
#[path = "stub_tests.rs"]
mod tests;
