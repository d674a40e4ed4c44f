//! Payload checksums and version numbering.
//!
//! Checksums are integrity signals for detecting local corruption, not
//! cryptographic protection. They must be identical across runs and across
//! payloads with identical content regardless of key insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic content checksum of a record payload.
///
/// Object keys are sorted at every nesting level before serialization, so
/// `{a:1,b:2}` and `{b:2,a:1}` hash identically while any value change
/// produces a different digest.
pub fn checksum(payload: &Value) -> String {
    let canonical = canonicalize(payload).to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut out = serde_json::Map::with_capacity(entries.len());
            for (key, val) in entries {
                out.insert(key.clone(), canonicalize(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Version for the next write of a record: 1 for a new record, otherwise
/// one past the stored version.
///
/// Must be computed inside the same logical transaction as the record
/// write; the store serializes read-modify-write so concurrent local
/// writers cannot mint the same version.
pub fn next_version(existing: Option<u64>) -> u64 {
    match existing {
        Some(version) => version + 1,
        None => 1,
    }
}
