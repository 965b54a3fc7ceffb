// src/utils/crypto.rs
//! Cryptographic helpers shared by the signer and the verifier.
//!
//! Covers the three encodings a DIDWba credential touches:
//! - SHA-256 digests (via `ring`)
//! - unpadded base64url for signatures and JWK coordinates
//! - JSON canonicalization of the signed payload

use ring::digest::{digest, SHA256};
use serde::Serialize;
use std::collections::BTreeMap;

/// Computes a SHA-256 digest of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash
///
/// # Returns
/// Fixed-size 32-byte array containing the digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// Encodes bytes as base64url without padding.
pub fn encode_base64url(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes base64url, tolerating trailing `=` padding.
///
/// # Errors
/// Returns the underlying decode error if the input is not valid base64url.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode_config(data.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
}

/// Serializes a flat string map in canonical JSON form (RFC 8785).
///
/// Keys are emitted in sorted order with no insignificant whitespace. For
/// objects whose values are plain strings, `serde_json`'s compact output over a
/// `BTreeMap` matches the JCS byte sequence.
pub fn canonicalize<K, V>(fields: &BTreeMap<K, V>) -> Vec<u8>
where
    K: Serialize + Ord,
    V: Serialize,
{
    // A map of strings cannot fail to serialize.
    serde_json::to_vec(fields).unwrap_or_default()
}
