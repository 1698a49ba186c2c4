// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned envelope for opaque executor state.
//!
//! Wire form: `[version u8][proto_len u16 BE][protocol bytes][payload]`.
//! The envelope names the owning plugin and versions the encoding; the
//! payload inside stays entirely plugin-defined.

use crate::ExecutorError;

/// Current envelope version.
pub const STATE_VERSION: u8 = 1;

/// Wrap a plugin payload in the state envelope.
pub fn encode_state(protocol: &str, payload: &[u8]) -> Vec<u8> {
    let proto = protocol.as_bytes();
    let mut bytes = Vec::with_capacity(3 + proto.len() + payload.len());
    bytes.push(STATE_VERSION);
    bytes.extend_from_slice(&(proto.len() as u16).to_be_bytes());
    bytes.extend_from_slice(proto);
    bytes.extend_from_slice(payload);
    bytes
}

/// Unwrap the state envelope, returning the protocol name and payload.
pub fn decode_state(bytes: &[u8]) -> Result<(String, Vec<u8>), ExecutorError> {
    if bytes.len() < 3 {
        return Err(ExecutorError::CorruptState("state shorter than envelope header".to_string()));
    }
    let version = bytes[0];
    if version != STATE_VERSION {
        return Err(ExecutorError::CorruptState(format!(
            "unsupported state version {version} (expected {STATE_VERSION})"
        )));
    }
    let proto_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    let rest = &bytes[3..];
    if rest.len() < proto_len {
        return Err(ExecutorError::CorruptState("truncated protocol name".to_string()));
    }
    let protocol = std::str::from_utf8(&rest[..proto_len])
        .map_err(|_| ExecutorError::CorruptState("protocol name is not UTF-8".to_string()))?
        .to_string();
    Ok((protocol, rest[proto_len..].to_vec()))
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
