// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tags, tag headers and tag selectors — the metadata catalog vocabulary.
//!
//! Objects in the catalog are versioned and append-only. A [`TagHeader`]
//! names one exact (object version, tag version) pair; a [`TagSelector`]
//! names an object and a version criteria (fixed or latest).

use crate::id::{JobKey, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved tag attribute: job status code, mirrored from the cache.
pub const ATTR_JOB_STATUS: &str = "trac_job_status";
/// Reserved tag attribute: human-readable job status detail.
pub const ATTR_JOB_MESSAGE: &str = "trac_job_message";
/// Reserved tag attribute: creation timestamp, epoch milliseconds.
pub const ATTR_CREATE_TIME: &str = "trac_create_time";
/// Reserved tag attribute: key of the parent job for group children.
pub const ATTR_PARENT_JOB: &str = "trac_parent_job";
/// Reserved tag attribute: identity that submitted the job.
pub const ATTR_JOB_OWNER: &str = "trac_job_owner";
/// Reserved tag attribute on outputs: the producing job's key.
pub const ATTR_SOURCE_JOB: &str = "trac_source_job";
/// Reserved tag attribute on outputs: the output name inside the job.
pub const ATTR_OUTPUT_NAME: &str = "trac_output_name";

/// Kind of object stored in the metadata catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Job,
    Model,
    Flow,
    Data,
    Schema,
    Storage,
    Result,
}

crate::simple_display! {
    ObjectType {
        Job => "JOB",
        Model => "MODEL",
        Flow => "FLOW",
        Data => "DATA",
        Schema => "SCHEMA",
        Storage => "STORAGE",
        Result => "RESULT",
    }
}

/// A typed attribute value attached to a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<u64> for AttrValue {
    fn from(i: u64) -> Self {
        AttrValue::Int(i as i64)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Exact address of one tag: object type, identity, object version, tag version.
///
/// Versions are 1-based; the metadata store allocates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagHeader {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
    pub object_version: u32,
    pub tag_version: u32,
}

impl TagHeader {
    pub fn new(object_type: ObjectType, object_id: ObjectId) -> Self {
        Self { object_type, object_id, object_version: 1, tag_version: 1 }
    }

    /// Printable object key, e.g. `MODEL-3f2a…-v2`.
    pub fn object_key(&self) -> String {
        format!("{}-{}-v{}", self.object_type, self.object_id, self.object_version)
    }

    /// The cache key form for job objects.
    pub fn job_key(&self, tenant: &str) -> JobKey {
        JobKey::new(tenant, self.object_id, self.object_version)
    }

    /// Recover the tenant and job tag header from a cache key.
    pub fn from_job_key(key: &JobKey) -> Option<(String, Self)> {
        let (tenant, object_id, object_version) = key.decode()?;
        let header =
            Self { object_type: ObjectType::Job, object_id, object_version, tag_version: 1 };
        Some((tenant, header))
    }

    /// Selector pinned to exactly this object and tag version.
    pub fn selector(&self) -> TagSelector {
        TagSelector {
            object_type: self.object_type,
            object_id: self.object_id,
            object_version: VersionCriteria::Number(self.object_version),
            tag_version: VersionCriteria::Number(self.tag_version),
        }
    }
}

impl std::fmt::Display for TagHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-v{}-t{}", self.object_type, self.object_id, self.object_version, self.tag_version)
    }
}

/// Version criteria in a selector: a fixed version or whatever is latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionCriteria {
    #[default]
    Latest,
    Number(u32),
}

/// Reference identifying an object and a version of it, fixed or latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelector {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
    #[serde(default)]
    pub object_version: VersionCriteria,
    #[serde(default)]
    pub tag_version: VersionCriteria,
}

impl TagSelector {
    /// Selector for the latest version and tag of an object.
    pub fn latest(object_type: ObjectType, object_id: ObjectId) -> Self {
        Self {
            object_type,
            object_id,
            object_version: VersionCriteria::Latest,
            tag_version: VersionCriteria::Latest,
        }
    }

    /// Same selector with the tag version relaxed to latest.
    pub fn latest_tag(mut self) -> Self {
        self.tag_version = VersionCriteria::Latest;
        self
    }

    /// True when both versions are pinned to fixed numbers.
    pub fn is_fixed(&self) -> bool {
        matches!(self.object_version, VersionCriteria::Number(_))
            && matches!(self.tag_version, VersionCriteria::Number(_))
    }

    /// Structural well-formedness: a selector must name a real identity.
    pub fn is_well_formed(&self) -> bool {
        !self.object_id.is_nil()
            && !matches!(self.object_version, VersionCriteria::Number(0))
            && !matches!(self.tag_version, VersionCriteria::Number(0))
    }
}

impl std::fmt::Display for TagSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.object_type, self.object_id)?;
        match self.object_version {
            VersionCriteria::Latest => write!(f, "-vL"),
            VersionCriteria::Number(n) => write!(f, "-v{n}"),
        }
    }
}

/// A single attribute write applied to a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUpdate {
    pub attr: String,
    pub value: AttrValue,
}

impl TagUpdate {
    pub fn new(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self { attr: attr.into(), value: value.into() }
    }
}

/// A tagged object version: header, definition, and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub header: TagHeader,
    pub definition: crate::object::ObjectDefinition,
    #[serde(default)]
    pub attrs: HashMap<String, AttrValue>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
