// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relational cache backend for HA deployments.
//!
//! One row per key with a `revision` column; every mutation is a single
//! conditional statement on `(key, revision)` plus the lease columns, so
//! correctness holds across processes sharing the database.

use crate::{CacheEntry, CacheError, JobCache, Ticket};
use async_trait::async_trait;
use drover_core::{Clock, JobKey};
use smol_str::SmolStr;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS job_cache (\
    key TEXT PRIMARY KEY,\
    revision INTEGER NOT NULL,\
    status TEXT NOT NULL,\
    lease_owner TEXT NULL,\
    lease_expiry INTEGER NULL,\
    value BLOB NOT NULL,\
    last_activity INTEGER NOT NULL)";

/// [`JobCache`] over a shared relational store.
pub struct SqlJobCache<C: Clock> {
    pool: SqlitePool,
    clock: C,
}

impl<C: Clock> SqlJobCache<C> {
    /// Connect and ensure the schema exists.
    pub async fn connect(url: &str, clock: C) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .connect(url)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Self::with_pool(pool, clock).await
    }

    /// Private in-memory database, for tests and throwaway deployments.
    pub async fn in_memory(clock: C) -> Result<Self, CacheError> {
        // A single connection keeps every handle on the same :memory: db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Self::with_pool(pool, clock).await
    }

    pub async fn with_pool(pool: SqlitePool, clock: C) -> Result<Self, CacheError> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self { pool, clock })
    }

    /// Figure out why a conditional write matched no row.
    async fn classify(&self, key: &JobKey, held: u64, holder: &str) -> CacheError {
        let row = match sqlx::query(
            "SELECT revision, lease_owner, lease_expiry FROM job_cache WHERE key = ?1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(e) => return CacheError::Backend(e.to_string()),
        };
        let Some(row) = row else {
            return CacheError::NotFound(key.clone());
        };
        let current = row.get::<i64, _>("revision") as u64;
        if current != held {
            return CacheError::Superseded { key: key.clone(), held, current };
        }
        let owner: Option<String> = row.get("lease_owner");
        let expiry: Option<i64> = row.get("lease_expiry");
        let now_ms = self.clock.epoch_ms() as i64;
        match (owner, expiry) {
            (Some(o), Some(e)) if o != holder && e > now_ms => CacheError::LeaseConflict(key.clone()),
            _ => CacheError::LeaseExpired(key.clone()),
        }
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> CacheEntry {
        CacheEntry {
            key: JobKey::from(row.get::<String, _>("key")),
            revision: row.get::<i64, _>("revision") as u64,
            status: SmolStr::new(row.get::<String, _>("status")),
            value: row.get::<Vec<u8>, _>("value"),
            last_activity_ms: row.get::<i64, _>("last_activity") as u64,
        }
    }
}

#[async_trait]
impl<C: Clock> JobCache for SqlJobCache<C> {
    async fn open_new_ticket(&self, key: &JobKey, duration: Duration) -> Result<Ticket, CacheError> {
        let now_ms = self.clock.epoch_ms() as i64;
        let expiry_ms = self.clock.deadline_ms(duration);
        let holder = Uuid::new_v4().to_string();

        // Clear any dead reservation before attempting the insert.
        sqlx::query(
            "DELETE FROM job_cache WHERE key = ?1 AND revision = 0 \
             AND (lease_owner IS NULL OR lease_expiry <= ?2)",
        )
        .bind(key.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO job_cache \
             (key, revision, status, lease_owner, lease_expiry, value, last_activity) \
             VALUES (?1, 0, '', ?2, ?3, x'', ?4)",
        )
        .bind(key.as_str())
        .bind(&holder)
        .bind(expiry_ms as i64)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        if inserted.rows_affected() != 1 {
            return Err(CacheError::AlreadyExists(key.clone()));
        }
        Ok(Ticket { key: key.clone(), revision: 0, holder: SmolStr::new(holder), expiry_ms })
    }

    async fn open_ticket(
        &self,
        key: &JobKey,
        revision: u64,
        duration: Duration,
    ) -> Result<Ticket, CacheError> {
        let now_ms = self.clock.epoch_ms() as i64;
        let expiry_ms = self.clock.deadline_ms(duration);
        let holder = Uuid::new_v4().to_string();

        let updated = sqlx::query(
            "UPDATE job_cache SET lease_owner = ?1, lease_expiry = ?2 \
             WHERE key = ?3 AND revision = ?4 AND revision > 0 \
             AND (lease_owner IS NULL OR lease_expiry <= ?5)",
        )
        .bind(&holder)
        .bind(expiry_ms as i64)
        .bind(key.as_str())
        .bind(revision as i64)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        if updated.rows_affected() != 1 {
            return Err(self.classify(key, revision, &holder).await);
        }
        Ok(Ticket { key: key.clone(), revision, holder: SmolStr::new(holder), expiry_ms })
    }

    async fn close_ticket(&self, ticket: &Ticket) {
        let released = sqlx::query(
            "UPDATE job_cache SET lease_owner = NULL, lease_expiry = NULL \
             WHERE key = ?1 AND lease_owner = ?2",
        )
        .bind(ticket.key.as_str())
        .bind(ticket.holder.as_str())
        .execute(&self.pool)
        .await;
        if released.is_err() {
            return;
        }
        // Abandoned reservation rows carry no entry; sweep them.
        let _ = sqlx::query(
            "DELETE FROM job_cache WHERE key = ?1 AND revision = 0 AND lease_owner IS NULL",
        )
        .bind(ticket.key.as_str())
        .execute(&self.pool)
        .await;
    }

    async fn add_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError> {
        let now_ms = self.clock.epoch_ms() as i64;
        let updated = sqlx::query(
            "UPDATE job_cache SET revision = 1, status = ?1, value = ?2, last_activity = ?3 \
             WHERE key = ?4 AND revision = 0 AND lease_owner = ?5 AND lease_expiry > ?6",
        )
        .bind(status)
        .bind(value)
        .bind(now_ms)
        .bind(ticket.key.as_str())
        .bind(ticket.holder.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        if updated.rows_affected() != 1 {
            return Err(self.classify(&ticket.key, ticket.revision, &ticket.holder).await);
        }
        Ok(1)
    }

    async fn update_entry(
        &self,
        ticket: &Ticket,
        status: &str,
        value: &[u8],
    ) -> Result<u64, CacheError> {
        let now_ms = self.clock.epoch_ms() as i64;
        let updated = sqlx::query(
            "UPDATE job_cache SET revision = revision + 1, status = ?1, value = ?2, last_activity = ?3 \
             WHERE key = ?4 AND revision = ?5 AND revision > 0 \
             AND lease_owner = ?6 AND lease_expiry > ?7",
        )
        .bind(status)
        .bind(value)
        .bind(now_ms)
        .bind(ticket.key.as_str())
        .bind(ticket.revision as i64)
        .bind(ticket.holder.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        if updated.rows_affected() != 1 {
            return Err(self.classify(&ticket.key, ticket.revision, &ticket.holder).await);
        }
        Ok(ticket.revision + 1)
    }

    async fn remove_entry(&self, ticket: &Ticket) -> Result<(), CacheError> {
        let now_ms = self.clock.epoch_ms() as i64;
        let deleted = sqlx::query(
            "DELETE FROM job_cache \
             WHERE key = ?1 AND revision = ?2 AND revision > 0 \
             AND lease_owner = ?3 AND lease_expiry > ?4",
        )
        .bind(ticket.key.as_str())
        .bind(ticket.revision as i64)
        .bind(ticket.holder.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        if deleted.rows_affected() != 1 {
            return Err(self.classify(&ticket.key, ticket.revision, &ticket.holder).await);
        }
        Ok(())
    }

    async fn get_entry(&self, key: &JobKey) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            "SELECT key, revision, status, value, last_activity FROM job_cache \
             WHERE key = ?1 AND revision > 0",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(row.as_ref().map(Self::entry_from_row))
    }

    async fn get_entry_at(
        &self,
        key: &JobKey,
        revision: u64,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            "SELECT key, revision, status, value, last_activity FROM job_cache \
             WHERE key = ?1 AND revision = ?2 AND revision > 0",
        )
        .bind(key.as_str())
        .bind(revision as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(row.as_ref().map(Self::entry_from_row))
    }

    async fn query_state(&self, statuses: &[&str]) -> Result<Vec<CacheEntry>, CacheError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT key, revision, status, value, last_activity FROM job_cache \
             WHERE revision > 0 AND status IN (",
        );
        let mut separated = builder.separated(", ");
        for status in statuses {
            separated.push_bind(*status);
        }
        separated.push_unseparated(") ORDER BY key");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(rows.iter().map(Self::entry_from_row).collect())
    }
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
