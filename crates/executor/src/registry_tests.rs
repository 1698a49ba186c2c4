// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::stub::StubExecutor;

#[test]
fn lookup_by_protocol() {
    let mut registry = ExecutorRegistry::new();
    registry.register("stub", Arc::new(StubExecutor::new()));

    assert!(registry.get("stub").is_ok());
    assert!(matches!(registry.get("k8s"), Err(ExecutorError::UnknownProtocol(_))));
}

#[test]
fn last_registration_wins() {
    let mut registry = ExecutorRegistry::new();
    let first = Arc::new(StubExecutor::new());
    let second = Arc::new(StubExecutor::new().without_cancellation());
    registry.register("stub", first);
    registry.register("stub", second);

    let resolved = registry.get("stub").unwrap();
    assert!(!resolved.has_feature(crate::Feature::Cancellation));
    assert_eq!(registry.protocols().count(), 1);
}
