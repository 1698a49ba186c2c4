// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-cache: leased, revisioned store of in-flight jobs.
//!
//! The cache is the coordination primitive of the orchestrator. Each key
//! holds one opaque value with a monotonically increasing revision; mutation
//! requires a [`Ticket`] — a lease over the key at a known revision. At any
//! wall-clock instant at most one unexpired lease exists per key, and stale
//! leases are reclaimable without operator action.
//!
//! Two backends: [`MemoryJobCache`] for single-node deployments and
//! [`SqlJobCache`] for HA deployments over a shared relational store.

mod memory;
mod sql;

pub use memory::MemoryJobCache;
pub use sql::SqlJobCache;

use async_trait::async_trait;
use drover_core::{ErrorKind, JobKey};
use smol_str::SmolStr;
use std::time::Duration;

/// A leased handle over a cache key, permitting exclusive mutation at a
/// known revision. Obtained from `open_new_ticket`/`open_ticket`; released
/// with `close_ticket` (idempotent) or by lease expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: JobKey,
    /// Revision the holder read. Revision 0 means the key is reserved but
    /// carries no entry yet.
    pub revision: u64,
    /// Random token identifying the holder.
    pub holder: SmolStr,
    /// Wall-clock lease expiry, epoch milliseconds.
    pub expiry_ms: u64,
}

/// Snapshot of one cache entry at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: JobKey,
    pub revision: u64,
    /// Query tag, mirrors the job status code. The cache never looks inside
    /// `value`; this duplicated tag is what `query_state` filters on.
    pub status: SmolStr,
    /// Opaque serialized value.
    pub value: Vec<u8>,
    /// Epoch ms of the last mutation, maintained by the backend.
    pub last_activity_ms: u64,
}

/// Errors raised by cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache entry already exists: {0}")]
    AlreadyExists(JobKey),
    #[error("cache entry not found: {0}")]
    NotFound(JobKey),
    #[error("superseded on {key}: ticket revision {held}, current {current}")]
    Superseded { key: JobKey, held: u64, current: u64 },
    #[error("lease conflict on {0}: another holder owns the lease")]
    LeaseConflict(JobKey),
    #[error("lease expired on {0}: pending mutation discarded")]
    LeaseExpired(JobKey),
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::Superseded { .. } => ErrorKind::Superseded,
            CacheError::LeaseConflict(_) => ErrorKind::LeaseConflict,
            CacheError::LeaseExpired(_) => ErrorKind::Superseded,
            CacheError::Backend(_) => ErrorKind::TransientIo,
        }
    }

    /// Losses another scheduler instance won the race for; skipped silently.
    pub fn is_concurrency_loss(&self) -> bool {
        self.kind().is_concurrency_loss()
    }
}

/// Leased, revisioned store of in-flight jobs.
///
/// Guarantees every backend must provide:
/// 1. At most one unexpired lease per key at any wall-clock instant.
/// 2. Lease expiry is wall-clock driven; stale leases are reclaimable.
/// 3. `open_ticket` with a stale revision fails fast with `Superseded`.
/// 4. Values are opaque blobs; the backend never inspects them.
/// 5. Every successful `update_entry` bumps the revision by exactly one.
#[async_trait]
pub trait JobCache: Send + Sync {
    /// Reserve a key that has no entry yet. Fails with `AlreadyExists` if an
    /// entry (or live reservation) is present.
    async fn open_new_ticket(&self, key: &JobKey, duration: Duration) -> Result<Ticket, CacheError>;

    /// Lease an existing entry at the given revision.
    async fn open_ticket(
        &self,
        key: &JobKey,
        revision: u64,
        duration: Duration,
    ) -> Result<Ticket, CacheError>;

    /// Release the lease. Safe to call multiple times; never fails.
    async fn close_ticket(&self, ticket: &Ticket);

    /// First write under a new-entry ticket. Returns the entry revision (1).
    async fn add_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError>;

    /// Replace status and value under a live lease. Returns the new revision.
    async fn update_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError>;

    /// Delete the entry under a live lease.
    async fn remove_entry(&self, ticket: &Ticket) -> Result<(), CacheError>;

    /// Latest revision of the entry at `key`, if present.
    async fn get_entry(&self, key: &JobKey) -> Result<Option<CacheEntry>, CacheError>;

    /// The entry at `key` only if its current revision equals `revision`.
    async fn get_entry_at(
        &self,
        key: &JobKey,
        revision: u64,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Latest revision of every entry whose status tag is in the set.
    /// Acquires no leases.
    async fn query_state(&self, statuses: &[&str]) -> Result<Vec<CacheEntry>, CacheError>;
}
