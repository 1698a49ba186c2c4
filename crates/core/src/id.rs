// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity primitives: metadata object identities and job cache keys.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

/// Identity of a metadata object, unique within a tenant.
///
/// Versions of the same object share the identity; a `TagHeader` pins the
/// identity to a specific object and tag version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ObjectId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

/// Printable job identifier, used as the cache key and in logs.
///
/// Format: `JOB-{tenant}-{object_id}-v{object_version}`. The format is
/// load-bearing: tenant and object identity can be recovered from the key
/// alone, which is what lets a corrupt cache entry still be failed against
/// the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(SmolStr);

impl JobKey {
    pub fn new(tenant: &str, object_id: ObjectId, object_version: u32) -> Self {
        Self(SmolStr::new(format!("JOB-{tenant}-{object_id}-v{object_version}")))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recover the tenant, object identity and version encoded in the key.
    pub fn decode(&self) -> Option<(String, ObjectId, u32)> {
        let rest = self.0.strip_prefix("JOB-")?;
        let (scoped_id, version) = rest.rsplit_once("-v")?;
        // The object id is a fixed-width uuid suffix; everything before it
        // (minus the separator) is the tenant, which may itself contain '-'.
        const UUID_LEN: usize = 36;
        if scoped_id.len() < UUID_LEN + 1 {
            return None;
        }
        let (tenant_dash, id) = scoped_id.split_at(scoped_id.len() - UUID_LEN);
        let tenant = tenant_dash.strip_suffix('-')?;
        if tenant.is_empty() {
            return None;
        }
        Some((tenant.to_string(), ObjectId::parse(id).ok()?, version.parse().ok()?))
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for JobKey {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for JobKey {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl AsRef<str> for JobKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::borrow::Borrow<str> for JobKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<str> for JobKey {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl PartialEq<&str> for JobKey {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == *other
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
