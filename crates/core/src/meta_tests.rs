// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn header_job_key_roundtrip() {
    let header = TagHeader {
        object_type: ObjectType::Job,
        object_id: ObjectId::random(),
        object_version: 2,
        tag_version: 5,
    };
    let key = header.job_key("acme");
    let (tenant, recovered) = TagHeader::from_job_key(&key).unwrap();
    assert_eq!(tenant, "acme");
    assert_eq!(recovered.object_id, header.object_id);
    assert_eq!(recovered.object_version, header.object_version);
    // Tag version is not encoded in the key; recovery pins it to 1.
    assert_eq!(recovered.tag_version, 1);
}

#[test]
fn header_selector_is_fixed() {
    let header = TagHeader::new(ObjectType::Model, ObjectId::random());
    let selector = header.selector();
    assert!(selector.is_fixed());
    assert_eq!(selector.object_version, VersionCriteria::Number(1));
}

#[parameterized(
    latest = { VersionCriteria::Latest, true },
    fixed = { VersionCriteria::Number(3), true },
    zero = { VersionCriteria::Number(0), false },
)]
fn selector_well_formed(version: VersionCriteria, ok: bool) {
    let selector = TagSelector {
        object_type: ObjectType::Data,
        object_id: ObjectId::random(),
        object_version: version,
        tag_version: VersionCriteria::Latest,
    };
    assert_eq!(selector.is_well_formed(), ok);
}

#[test]
fn selector_nil_id_is_malformed() {
    let selector = TagSelector::latest(ObjectType::Model, ObjectId::nil());
    assert!(!selector.is_well_formed());
}

#[test]
fn attr_value_untagged_serde() {
    let json = serde_json::to_string(&AttrValue::Int(42)).unwrap();
    assert_eq!(json, "42");
    let back: AttrValue = serde_json::from_str("\"hello\"").unwrap();
    assert_eq!(back, AttrValue::Str("hello".into()));
    let b: AttrValue = serde_json::from_str("true").unwrap();
    assert_eq!(b, AttrValue::Bool(true));
}

#[test]
fn selector_defaults_to_latest() {
    let id = ObjectId::random();
    let json = format!("{{\"object_type\":\"MODEL\",\"object_id\":\"{id}\"}}");
    let selector: TagSelector = serde_json::from_str(&json).unwrap();
    assert_eq!(selector.object_version, VersionCriteria::Latest);
    assert_eq!(selector.tag_version, VersionCriteria::Latest);
}
