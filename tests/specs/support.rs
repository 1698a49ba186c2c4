// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the end-to-end scenarios: memory metadata store,
//! a pluggable cache backend, the scripted stub executor, and a fake clock.

use drover_cache::{JobCache, MemoryJobCache, SqlJobCache};
use drover_core::test_support::import_model_job;
use drover_core::{
    FakeClock, JobKey, JobResult, JobStatus, JobStatusCode, ObjectDefinition, ObjectType,
    OrchestratorConfig, Tag, TagSelector,
};
use drover_engine::{EngineContext, JobApi, JobRequest, Scheduler, StatusHub};
use drover_exec::stub::StubExecutor;
use drover_exec::ExecutorRegistry;
use drover_metadata::{MemoryMetadataStore, MetadataClient};
use std::sync::Arc;
use std::time::Duration;

pub const TENANT: &str = "acme";

pub struct Harness {
    pub clock: FakeClock,
    pub store: Arc<MemoryMetadataStore<FakeClock>>,
    pub cache: Arc<dyn JobCache>,
    pub exec: StubExecutor,
    pub api: JobApi<FakeClock>,
    pub scheduler: Scheduler<FakeClock>,
}

impl Harness {
    pub fn new(exec: StubExecutor) -> Self {
        Self::with_config(exec, OrchestratorConfig::default().executor("stub"))
    }

    pub fn with_config(exec: StubExecutor, config: OrchestratorConfig) -> Self {
        let clock = FakeClock::new();
        let cache = Arc::new(MemoryJobCache::new(clock.clone()));
        Self::assemble(exec, config, clock, cache)
    }

    /// Same harness over the relational cache backend.
    pub async fn with_sql_cache(exec: StubExecutor) -> Self {
        let clock = FakeClock::new();
        let cache = Arc::new(SqlJobCache::in_memory(clock.clone()).await.unwrap());
        Self::assemble(exec, OrchestratorConfig::default().executor("stub"), clock, cache)
    }

    fn assemble(
        exec: StubExecutor,
        config: OrchestratorConfig,
        clock: FakeClock,
        cache: Arc<dyn JobCache>,
    ) -> Self {
        let store = Arc::new(MemoryMetadataStore::new(clock.clone()));
        let mut registry = ExecutorRegistry::new();
        registry.register("stub", Arc::new(exec.clone()));

        let ctx = EngineContext::new(
            store.clone(),
            Arc::clone(&cache),
            Arc::new(registry),
            config,
            clock.clone(),
        )
        .unwrap();
        let hub = StatusHub::default();
        let api = JobApi::new(ctx.clone(), hub.clone());
        let scheduler = Scheduler::new(ctx, hub);
        Self { clock, store, cache, exec, api, scheduler }
    }

    pub async fn submit_import(&self) -> JobStatus {
        self.api
            .submit_job(JobRequest::new(TENANT, import_model_job(), "alice"))
            .await
            .unwrap()
    }

    /// Tick and advance the clock until the cache entry disappears.
    pub async fn drive_until_removed(&self, key: &JobKey) {
        for _ in 0..15 {
            self.scheduler.tick().await;
            self.clock.advance(Duration::from_secs(2));
            if self.cache.get_entry(key).await.unwrap().is_none() {
                return;
            }
        }
        panic!("job {key} never left the cache");
    }

    /// Tick and advance until the cached status equals `status`.
    pub async fn drive_until_status(&self, key: &JobKey, status: JobStatusCode) {
        let wanted = status.to_string();
        for _ in 0..15 {
            if let Some(entry) = self.cache.get_entry(key).await.unwrap() {
                if entry.status == wanted.as_str() {
                    return;
                }
            }
            self.scheduler.tick().await;
            self.clock.advance(Duration::from_secs(2));
        }
        panic!("job {key} never reached {status}");
    }

    pub async fn job_tag(&self, status: &JobStatus) -> Tag {
        let header = status.job_id.unwrap();
        self.store
            .read_object(TENANT, &TagSelector::latest(ObjectType::Job, header.object_id))
            .await
            .unwrap()
    }

    pub fn job_selector(status: &JobStatus) -> TagSelector {
        status.job_id.unwrap().selector().latest_tag()
    }
}

/// A result document reporting success with one imported model output.
pub fn import_success_document() -> Vec<u8> {
    let mut outputs = indexmap::IndexMap::new();
    outputs.insert(
        "model".to_string(),
        ObjectDefinition::Model(drover_core::test_support::hello_model()),
    );
    serde_json::to_vec(&JobResult {
        status_code: JobStatusCode::Succeeded,
        status_message: "import complete".to_string(),
        exit_code: Some(0),
        outputs,
    })
    .unwrap()
}

/// Drain everything currently buffered on a follow stream.
pub async fn drain_statuses(rx: &mut tokio::sync::mpsc::Receiver<JobStatus>) -> Vec<JobStatusCode> {
    let mut seen = Vec::new();
    while let Ok(status) =
        tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
    {
        match status {
            Some(status) => seen.push(status.status_code),
            None => break,
        }
    }
    seen
}
