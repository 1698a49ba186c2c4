// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client contract for the metadata store.
//!
//! The store is authoritative and append-only: object versions and tag
//! versions are only ever added, never rewritten. The orchestrator consumes
//! this surface; the store service itself lives elsewhere.

use async_trait::async_trait;
use drover_core::{
    AttrValue, ErrorKind, ObjectDefinition, ObjectType, Tag, TagHeader, TagSelector, TagUpdate,
};
use thiserror::Error;

/// Errors surfaced by a metadata store client.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid metadata request: {0}")]
    BadRequest(String),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

impl MetadataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetadataError::NotFound(_) => ErrorKind::NotFound,
            MetadataError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            MetadataError::BadRequest(_) => ErrorKind::ValidationFailed,
            MetadataError::Unavailable(_) => ErrorKind::TransientIo,
        }
    }
}

/// One operation inside an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Fill in a preallocated identity with its first definition and tag.
    CreatePreallocated {
        header: TagHeader,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    },
    /// Tag-only update: a new tag version on an existing object version.
    UpdateTag { selector: TagSelector, attrs: Vec<TagUpdate> },
}

/// An ordered, atomic multi-operation write. All-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub tenant: String,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self { tenant: tenant.into(), ops: Vec::new() }
    }

    pub fn create_preallocated(
        mut self,
        header: TagHeader,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    ) -> Self {
        self.ops.push(WriteOp::CreatePreallocated { header, definition, attrs });
        self
    }

    pub fn update_tag(mut self, selector: TagSelector, attrs: Vec<TagUpdate>) -> Self {
        self.ops.push(WriteOp::UpdateTag { selector, attrs });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Versioned, tagged object catalog: create, read, update, search.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Reserve an identity for an object that will be written later.
    ///
    /// A reserved identity with no subsequent object is legal and invisible
    /// to reads.
    async fn preallocate_id(
        &self,
        tenant: &str,
        object_type: ObjectType,
    ) -> Result<TagHeader, MetadataError>;

    /// Write the first version of a preallocated object.
    async fn create_preallocated_object(
        &self,
        tenant: &str,
        header: &TagHeader,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError>;

    /// Append a new object version.
    async fn update_object(
        &self,
        tenant: &str,
        selector: &TagSelector,
        definition: ObjectDefinition,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError>;

    /// Append a new tag version carrying updated attributes. Never creates
    /// a new object version.
    async fn update_tag(
        &self,
        tenant: &str,
        selector: &TagSelector,
        attrs: Vec<TagUpdate>,
    ) -> Result<TagHeader, MetadataError>;

    /// Resolve one selector to its tag.
    async fn read_object(&self, tenant: &str, selector: &TagSelector) -> Result<Tag, MetadataError>;

    /// Resolve several selectors in order; fails on the first miss.
    async fn read_batch(
        &self,
        tenant: &str,
        selectors: &[TagSelector],
    ) -> Result<Vec<Tag>, MetadataError>;

    /// Find latest tags of a type carrying an attribute value.
    async fn search(
        &self,
        tenant: &str,
        object_type: ObjectType,
        attr: &str,
        value: &AttrValue,
    ) -> Result<Vec<Tag>, MetadataError>;

    /// Apply a batch atomically. Replays of `CreatePreallocated` ops that
    /// carry identical content succeed without duplicating anything.
    async fn write_batch(&self, batch: WriteBatch) -> Result<Vec<TagHeader>, MetadataError>;
}
