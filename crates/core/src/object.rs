// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object definitions — the payloads stored against catalog versions.

use crate::job::{JobStatusCode, JobType};
use crate::meta::{AttrValue, ObjectType, TagHeader, TagSelector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Primitive value types for parameters and schema fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BasicType {
    Bool,
    Int,
    Float,
    Str,
}

crate::simple_display! {
    BasicType {
        Bool => "BOOL",
        Int => "INT",
        Float => "FLOAT",
        Str => "STR",
    }
}

impl BasicType {
    /// Whether a concrete attribute value inhabits this type.
    pub fn admits(&self, value: &AttrValue) -> bool {
        matches!(
            (self, value),
            (BasicType::Bool, AttrValue::Bool(_))
                | (BasicType::Int, AttrValue::Int(_))
                | (BasicType::Float, AttrValue::Float(_))
                | (BasicType::Float, AttrValue::Int(_))
                | (BasicType::Str, AttrValue::Str(_))
        )
    }
}

/// One column of a tabular schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: BasicType,
    #[serde(default)]
    pub not_null: bool,
}

/// Tabular schema: an ordered list of named, typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Version compatibility: every field of `prior` must survive with the
    /// same type. New fields may be added.
    pub fn is_compatible_with(&self, prior: &TableSchema) -> bool {
        prior.fields.iter().all(|p| {
            self.field(&p.name).is_some_and(|f| f.field_type == p.field_type)
        })
    }
}

/// Declared model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: BasicType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<AttrValue>,
}

/// Declared model input or output port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPort {
    pub schema: TableSchema,
    #[serde(default)]
    pub optional: bool,
}

/// A model imported into the platform: code coordinates plus declared shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub entry_point: String,
    pub repo: String,
    pub version: String,
    #[serde(default)]
    pub parameters: IndexMap<String, ParamSpec>,
    #[serde(default)]
    pub inputs: IndexMap<String, ModelPort>,
    #[serde(default)]
    pub outputs: IndexMap<String, ModelPort>,
}

/// Source coordinates for an IMPORT_MODEL job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportDetails {
    pub repo: String,
    pub version: String,
    pub entry_point: String,
}

/// An execution request: what to run and with which metadata bindings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobDefinition {
    pub job_type: JobType,
    #[serde(default)]
    pub parameters: IndexMap<String, AttrValue>,
    /// Input datasets by model/flow input name.
    #[serde(default)]
    pub inputs: IndexMap<String, TagSelector>,
    /// Prior versions of outputs to supersede, by output name.
    #[serde(default)]
    pub outputs: IndexMap<String, TagSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<TagSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<TagSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportDetails>,
    /// Storage binding for IMPORT_DATA / EXPORT_DATA jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<TagSelector>,
    /// Child requests for JOB_GROUP jobs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JobDefinition>,
}

/// Node in a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowNode {
    Input,
    Output,
    Model { model: TagSelector },
}

/// A wiring of models into a directed graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub nodes: IndexMap<String, FlowNode>,
    /// Edges as `target_node.input <- source_node[.output]`.
    #[serde(default)]
    pub edges: IndexMap<String, String>,
}

impl FlowDefinition {
    /// Selectors of every model node, keyed by node name.
    pub fn model_selectors(&self) -> impl Iterator<Item = (&str, &TagSelector)> {
        self.nodes.iter().filter_map(|(name, node)| match node {
            FlowNode::Model { model } => Some((name.as_str(), model)),
            _ => None,
        })
    }
}

/// A dataset: schema plus its storage binding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataDefinition {
    pub schema: TableSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<TagSelector>,
}

/// A reusable schema object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub table: TableSchema,
}

/// A storage location models read from and write to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageDefinition {
    pub protocol: String,
    pub location: String,
}

/// Durable record of a finished job: final status and produced objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDefinition {
    pub job_id: TagHeader,
    pub status_code: JobStatusCode,
    pub status_message: String,
    #[serde(default)]
    pub outputs: IndexMap<String, TagHeader>,
}

/// The definition payload of a catalog object, one variant per object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectDefinition {
    Job(JobDefinition),
    Model(ModelDefinition),
    Flow(FlowDefinition),
    Data(DataDefinition),
    Schema(SchemaDefinition),
    Storage(StorageDefinition),
    Result(ResultDefinition),
}

impl ObjectDefinition {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectDefinition::Job(_) => ObjectType::Job,
            ObjectDefinition::Model(_) => ObjectType::Model,
            ObjectDefinition::Flow(_) => ObjectType::Flow,
            ObjectDefinition::Data(_) => ObjectType::Data,
            ObjectDefinition::Schema(_) => ObjectType::Schema,
            ObjectDefinition::Storage(_) => ObjectType::Storage,
            ObjectDefinition::Result(_) => ObjectType::Result,
        }
    }

    pub fn as_model(&self) -> Option<&ModelDefinition> {
        match self {
            ObjectDefinition::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataDefinition> {
        match self {
            ObjectDefinition::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_job(&self) -> Option<&JobDefinition> {
        match self {
            ObjectDefinition::Job(j) => Some(j),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
