// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for this crate's tests and downstream crates' tests.

use crate::meta::{ObjectType, TagSelector};
use crate::object::{
    BasicType, FieldSchema, ImportDetails, JobDefinition, ModelDefinition, ModelPort, ParamSpec,
    TableSchema,
};
use indexmap::IndexMap;

/// Tabular schema from `(name, type)` pairs.
pub fn table_schema(fields: &[(&str, BasicType)]) -> TableSchema {
    TableSchema {
        fields: fields
            .iter()
            .map(|(name, field_type)| FieldSchema {
                name: name.to_string(),
                field_type: *field_type,
                not_null: false,
            })
            .collect(),
    }
}

/// A model with one required input, one output, and one INT parameter.
pub fn hello_model() -> ModelDefinition {
    let mut parameters = IndexMap::new();
    parameters.insert(
        "rounds".to_string(),
        ParamSpec { param_type: BasicType::Int, default_value: None },
    );
    let mut inputs = IndexMap::new();
    inputs.insert(
        "customers".to_string(),
        ModelPort {
            schema: table_schema(&[("id", BasicType::Int), ("name", BasicType::Str)]),
            optional: false,
        },
    );
    let mut outputs = IndexMap::new();
    outputs.insert(
        "scores".to_string(),
        ModelPort {
            schema: table_schema(&[("id", BasicType::Int), ("score", BasicType::Float)]),
            optional: false,
        },
    );
    ModelDefinition {
        entry_point: "acme.models.Hello".to_string(),
        repo: "local".to_string(),
        version: "v1.0.0".to_string(),
        parameters,
        inputs,
        outputs,
    }
}

/// An IMPORT_MODEL request matching [`hello_model`].
pub fn import_model_job() -> JobDefinition {
    JobDefinition {
        job_type: crate::job::JobType::ImportModel,
        import: Some(ImportDetails {
            repo: "local".to_string(),
            version: "v1.0.0".to_string(),
            entry_point: "acme.models.Hello".to_string(),
        }),
        ..JobDefinition::default()
    }
}

/// A RUN_MODEL request against the given model and input selectors.
pub fn run_model_job(model: TagSelector, input: TagSelector) -> JobDefinition {
    let mut parameters = IndexMap::new();
    parameters.insert("rounds".to_string(), crate::meta::AttrValue::Int(3));
    let mut inputs = IndexMap::new();
    inputs.insert("customers".to_string(), input);
    JobDefinition {
        job_type: crate::job::JobType::RunModel,
        parameters,
        inputs,
        model: Some(model),
        ..JobDefinition::default()
    }
}

/// Selector for a random object of the given type (resolves to nothing).
pub fn dangling_selector(object_type: ObjectType) -> TagSelector {
    TagSelector::latest(object_type, crate::id::ObjectId::random())
}
