// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory metadata store for single-node deployments and tests.
//!
//! Tenant-partitioned, append-only. Writes go through a cloned tenant view
//! and commit by swap, so a failed batch leaves nothing behind.

use crate::client::{MetadataClient, MetadataError, WriteBatch, WriteOp};
use async_trait::async_trait;
use drover_core::{
    AttrValue, Clock, ObjectDefinition, ObjectId, ObjectType, Tag, TagHeader, TagSelector,
    TagUpdate, VersionCriteria, ATTR_CREATE_TIME,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Default)]
struct TenantStore {
    objects: HashMap<ObjectId, ObjectRecord>,
}

#[derive(Debug, Clone)]
struct ObjectRecord {
    object_type: ObjectType,
    /// Index 0 is object version 1. Empty while only preallocated.
    versions: Vec<VersionRecord>,
}

#[derive(Debug, Clone)]
struct VersionRecord {
    definition: ObjectDefinition,
    /// Index 0 is tag version 1. Never empty.
    tags: Vec<HashMap<String, AttrValue>>,
}

/// Shared in-memory catalog.
pub struct MemoryMetadataStore<C: Clock> {
    clock: C,
    tenants: Mutex<HashMap<String, TenantStore>>,
    write_batches: AtomicU32,
    fail_writes: AtomicU32,
}

impl<C: Clock> MemoryMetadataStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            tenants: Mutex::new(HashMap::new()),
            write_batches: AtomicU32::new(0),
            fail_writes: AtomicU32::new(0),
        }
    }

    /// Number of committed write batches.
    #[cfg(any(test, feature = "test-support"))]
    pub fn write_batch_count(&self) -> u32 {
        self.write_batches.load(Ordering::SeqCst)
    }

    /// Make the next `n` `write_batch` calls fail with `Unavailable`.
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_next_write_batches(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    fn resolve<'a>(
        tenant: &'a TenantStore,
        selector: &TagSelector,
    ) -> Result<(&'a ObjectRecord, u32, u32), MetadataError> {
        let record = tenant
            .objects
            .get(&selector.object_id)
            .filter(|r| !r.versions.is_empty())
            .ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        if record.object_type != selector.object_type {
            return Err(MetadataError::NotFound(selector.to_string()));
        }
        let object_version = match selector.object_version {
            VersionCriteria::Latest => record.versions.len() as u32,
            VersionCriteria::Number(n) => n,
        };
        let version = record
            .versions
            .get(object_version.wrapping_sub(1) as usize)
            .ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        let tag_version = match selector.tag_version {
            VersionCriteria::Latest => version.tags.len() as u32,
            VersionCriteria::Number(n) => n,
        };
        if tag_version == 0 || tag_version as usize > version.tags.len() {
            return Err(MetadataError::NotFound(selector.to_string()));
        }
        Ok((record, object_version, tag_version))
    }

    fn tag_at(record: &ObjectRecord, selector: &TagSelector, object_version: u32, tag_version: u32) -> Tag {
        let version = &record.versions[(object_version - 1) as usize];
        Tag {
            header: TagHeader {
                object_type: selector.object_type,
                object_id: selector.object_id,
                object_version,
                tag_version,
            },
            definition: version.definition.clone(),
            attrs: version.tags[(tag_version - 1) as usize].clone(),
        }
    }

    fn attr_map(attrs: &[TagUpdate], create_time: u64) -> HashMap<String, AttrValue> {
        let mut map: HashMap<String, AttrValue> =
            attrs.iter().map(|u| (u.attr.clone(), u.value.clone())).collect();
        map.entry(ATTR_CREATE_TIME.to_string()).or_insert(AttrValue::Int(create_time as i64));
        map
    }

    /// Apply one op against a tenant view. Returns the resulting header.
    fn apply(
        tenant: &mut TenantStore,
        op: &WriteOp,
        create_time: u64,
    ) -> Result<TagHeader, MetadataError> {
        match op {
            WriteOp::CreatePreallocated { header, definition, attrs } => {
                let record = tenant
                    .objects
                    .get_mut(&header.object_id)
                    .ok_or_else(|| MetadataError::NotFound(header.object_key()))?;
                if record.object_type != header.object_type
                    || record.object_type != definition.object_type()
                {
                    return Err(MetadataError::BadRequest(format!(
                        "object type mismatch for {}",
                        header.object_key()
                    )));
                }
                if let Some(existing) = record.versions.first() {
                    // Idempotent replay: identical content is a no-op.
                    if existing.definition == *definition {
                        return Ok(TagHeader { object_version: 1, tag_version: 1, ..*header });
                    }
                    return Err(MetadataError::AlreadyExists(header.object_key()));
                }
                record.versions.push(VersionRecord {
                    definition: definition.clone(),
                    tags: vec![Self::attr_map(attrs, create_time)],
                });
                Ok(TagHeader { object_version: 1, tag_version: 1, ..*header })
            }
            WriteOp::UpdateTag { selector, attrs } => {
                let (_, object_version, _) = Self::resolve(tenant, selector)?;
                let record = tenant
                    .objects
                    .get_mut(&selector.object_id)
                    .ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
                let version = &mut record.versions[(object_version - 1) as usize];
                let mut next = version.tags[version.tags.len() - 1].clone();
                for update in attrs {
                    next.insert(update.attr.clone(), update.value.clone());
                }
                // Idempotent replay: no attribute changed, no new tag version.
                if next == version.tags[version.tags.len() - 1] {
                    return Ok(TagHeader {
                        object_type: selector.object_type,
                        object_id: selector.object_id,
                        object_version,
                        tag_version: version.tags.len() as u32,
                    });
                }
                version.tags.push(next);
                Ok(TagHeader {
                    object_type: selector.object_type,
                    object_id: selector.object_id,
                    object_version,
                    tag_version: version.tags.len() as u32,
                })
            }
        }
    }
}

#[async_trait]
impl<C: Clock> MetadataClient for MemoryMetadataStore<C> {
    async fn preallocate_id(
        &self,
        tenant: &str,
        object_type: ObjectType,
    ) -> Result<TagHeader, MetadataError> {
        let mut tenants = self.tenants.lock();
        let store = tenants.entry(tenant.to_string()).or_default();
        let object_id = ObjectId::random();
        store.objects.insert(object_id, ObjectRecord { object_type, versions: Vec::new() });
        Ok(TagHeader::new(object_type, object_id))
    }

    async fn create_preallocated_object(
        &self,
        tenant: &str,
        header: &TagHeader,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError> {
        let create_time = self.clock.epoch_ms();
        let mut tenants = self.tenants.lock();
        let store = tenants
            .get_mut(tenant)
            .ok_or_else(|| MetadataError::NotFound(header.object_key()))?;
        Self::apply(
            store,
            &WriteOp::CreatePreallocated { header: *header, definition, attrs },
            create_time,
        )
    }

    async fn update_object(
        &self,
        tenant: &str,
        selector: &TagSelector,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError> {
        let create_time = self.clock.epoch_ms();
        let mut tenants = self.tenants.lock();
        let store =
            tenants.get_mut(tenant).ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        let (record, _, _) = Self::resolve(store, selector)?;
        if record.object_type != definition.object_type() {
            return Err(MetadataError::BadRequest(format!(
                "object type mismatch for {selector}"
            )));
        }
        let record = store
            .objects
            .get_mut(&selector.object_id)
            .ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        record.versions.push(VersionRecord {
            definition,
            tags: vec![Self::attr_map(&attrs, create_time)],
        });
        Ok(TagHeader {
            object_type: selector.object_type,
            object_id: selector.object_id,
            object_version: record.versions.len() as u32,
            tag_version: 1,
        })
    }

    async fn update_tag(
        &self,
        tenant: &str,
        selector: &TagSelector,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError> {
        let create_time = self.clock.epoch_ms();
        let mut tenants = self.tenants.lock();
        let store =
            tenants.get_mut(tenant).ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        Self::apply(store, &WriteOp::UpdateTag { selector: *selector, attrs }, create_time)
    }

    async fn read_object(&self, tenant: &str, selector: &TagSelector) -> Result<Tag, MetadataError> {
        let tenants = self.tenants.lock();
        let store =
            tenants.get(tenant).ok_or_else(|| MetadataError::NotFound(selector.to_string()))?;
        let (record, object_version, tag_version) = Self::resolve(store, selector)?;
        Ok(Self::tag_at(record, selector, object_version, tag_version))
    }

    async fn read_batch(
        &self,
        tenant: &str,
        selectors: &[TagSelector],
    ) -> Result<Vec<Tag>, MetadataError> {
        let tenants = self.tenants.lock();
        let store = tenants
            .get(tenant)
            .ok_or_else(|| MetadataError::NotFound(format!("tenant {tenant}")))?;
        selectors
            .iter()
            .map(|selector| {
                let (record, object_version, tag_version) = Self::resolve(store, selector)?;
                Ok(Self::tag_at(record, selector, object_version, tag_version))
            })
            .collect()
    }

    async fn search(
        &self,
        tenant: &str,
        object_type: ObjectType,
        attr: &str,
        value: &AttrValue,
    ) -> Result<Vec<Tag>, MetadataError> {
        let tenants = self.tenants.lock();
        let store = match tenants.get(tenant) {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        let mut hits = Vec::new();
        for (object_id, record) in &store.objects {
            if record.object_type != object_type || record.versions.is_empty() {
                continue;
            }
            let selector = TagSelector::latest(object_type, *object_id);
            let (record, object_version, tag_version) = Self::resolve(store, &selector)?;
            let tag = Self::tag_at(record, &selector, object_version, tag_version);
            if tag.attr(attr) == Some(value) {
                hits.push(tag);
            }
        }
        Ok(hits)
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<Vec<TagHeader>, MetadataError> {
        if batch.is_empty() {
            return Err(MetadataError::BadRequest("empty write batch".to_string()));
        }
        let remaining = self.fail_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(MetadataError::Unavailable("injected write failure".to_string()));
        }

        // One timestamp for the whole batch: outputs and the final job tag
        // share their create time.
        let create_time = self.clock.epoch_ms();
        let mut tenants = self.tenants.lock();
        let store = tenants
            .get_mut(&batch.tenant)
            .ok_or_else(|| MetadataError::NotFound(format!("tenant {}", batch.tenant)))?;

        // Apply against a copy, commit by swap.
        let mut view = store.clone();
        let mut headers = Vec::with_capacity(batch.ops.len());
        for op in &batch.ops {
            headers.push(Self::apply(&mut view, op, create_time)?);
        }
        *store = view;
        self.write_batches.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(tenant = %batch.tenant, ops = batch.ops.len(), "write batch committed");
        Ok(headers)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
