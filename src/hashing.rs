//! Hashing System - SHA-256 for Composed Output
//!
//! Provides deterministic, reproducible hashes so two runs (or two artwork
//! adapters) can be compared byte for byte.

use serde::Serialize;
use serde_json::to_string;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonical JSON: keys sorted, no whitespace.
///
/// Going through [`serde_json::Value`] is what sorts the keys: `serde_json::Map` is a
/// `BTreeMap` as long as the `preserve_order` feature stays off, and struct
/// fields would otherwise come out in declaration order.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    to_string(&serde_json::to_value(value)?)
}

/// Hash of the canonical JSON form of any serializable value
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Identifies one composition job independent of when or where it ran.
/// job_hash = sha256(template_id + canonical_descriptor + sha256(source) + engine_version)
pub fn compute_job_hash(
    template_id: &str,
    descriptor: &impl Serialize,
    source_markup: &str,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_descriptor = canonical_json(descriptor)?;
    let combined = format!(
        "{}:{}:{}:{}",
        template_id,
        canonical_descriptor,
        sha256_hex(source_markup.as_bytes()),
        engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}
