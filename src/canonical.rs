//! Canonical JSON encoding and record digests
//!
//! Append-time hashing and verify-time recomputation both go through
//! [`record_digest`], so the two call sites cannot drift apart.
//!
//! Canonical form:
//! - object keys sorted by byte order, recursively
//! - `,` and `:` separators, no whitespace
//! - strings and numbers in serde_json's fixed formatting

use crate::types::Payload;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Encode a JSON value canonically
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Encode a payload map canonically
pub fn payload_to_canonical_string(payload: &Payload) -> String {
    let mut out = String::new();
    write_object(payload, &mut out);
    out
}

/// Canonical hash input for a record
///
/// Equivalent to the canonical encoding of
/// `{"payload": .., "prev_hash": .., "sequence_time": ..}`.
pub fn record_preimage(sequence_time: u64, prev_hash: &str, payload: &Payload) -> String {
    let mut out = String::from("{\"payload\":");
    write_object(payload, &mut out);
    out.push_str(",\"prev_hash\":");
    write_str(prev_hash, &mut out);
    out.push_str(",\"sequence_time\":");
    out.push_str(&sequence_time.to_string());
    out.push('}');
    out
}

/// Hex-encoded SHA-256 of the record preimage
pub fn record_digest(sequence_time: u64, prev_hash: &str, payload: &Payload) -> String {
    let preimage = record_preimage(sequence_time, prev_hash, payload);
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // Leaves: serde_json's Display is already compact and stable
        leaf => out.push_str(&leaf.to_string()),
    }
}

fn write_object(map: &Payload, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_str(key, out);
        out.push(':');
        write_value(&map[key.as_str()], out);
    }
    out.push('}');
}

fn write_str(s: &str, out: &mut String) {
    out.push_str(&Value::from(s).to_string());
}
