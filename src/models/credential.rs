// src/models/credential.rs
//! Parsed authorization credentials.
//!
//! An `Authorization` header carries one of two schemes. [`AuthScheme`] is the
//! closed set the parser produces; the authenticator matches on it instead of
//! re-inspecting header text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::crypto::canonicalize;

/// Scheme prefix for DID-signed credentials.
pub const DIDWBA_SCHEME: &str = "DIDWba";

/// Scheme prefix for service-issued bearer tokens.
pub const BEARER_SCHEME: &str = "Bearer";

/// A decomposed DIDWba authorization header.
///
/// Parsed fresh for every request and never persisted.
///
/// # Fields
/// - `did`: identity reference of the caller
/// - `nonce`: caller-chosen random string, single use per DID
/// - `timestamp`: ISO-8601 UTC time of signing, kept verbatim as signed
/// - `verification_method`: fragment of the signing key, if named
/// - `signature`: base64url signature over [`Credential::signing_payload`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Example: "did:wba:example.com:user:alice"
    pub did: String,

    /// Example: "c2c4e6a1f0b3d5e7a9c1e3f5a7b9d1e3"
    pub nonce: String,

    /// Example: "2024-12-05T12:34:56Z"
    pub timestamp: String,

    /// Example: "key-1"
    pub verification_method: Option<String>,

    pub signature: String,
}

impl Credential {
    /// Canonical bytes the client must sign, bound to the serving `domain`.
    ///
    /// The payload is the JSON object `{did, nonce, service, timestamp}` in
    /// canonical form, so a credential signed for one domain never verifies
    /// for another.
    pub fn signing_payload(&self, domain: &str) -> Vec<u8> {
        signing_payload(&self.did, &self.nonce, &self.timestamp, domain)
    }

    /// Renders the credential back into header form.
    pub fn to_header(&self) -> String {
        let mut header = format!(
            "{} did=\"{}\", nonce=\"{}\", timestamp=\"{}\"",
            DIDWBA_SCHEME, self.did, self.nonce, self.timestamp
        );
        if let Some(method) = &self.verification_method {
            header.push_str(&format!(", verification_method=\"{}\"", method));
        }
        header.push_str(&format!(", signature=\"{}\"", self.signature));
        header
    }
}

/// Builds the canonical signing payload from its parts.
pub fn signing_payload(did: &str, nonce: &str, timestamp: &str, domain: &str) -> Vec<u8> {
    let mut fields = BTreeMap::new();
    fields.insert("did", did);
    fields.insert("nonce", nonce);
    fields.insert("service", domain);
    fields.insert("timestamp", timestamp);
    canonicalize(&fields)
}

/// The credential scheme found in an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// A DID-signed credential
    DidWba(Credential),
    /// A previously issued bearer token
    Bearer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            did: "did:wba:example.com:user:alice".into(),
            nonce: "n1".into(),
            timestamp: "2024-12-05T12:34:56Z".into(),
            verification_method: Some("key-1".into()),
            signature: "c2ln".into(),
        }
    }

    #[test]
    fn test_signing_payload_binds_domain() {
        let cred = credential();
        let a = cred.signing_payload("a.example.com");
        let b = cred.signing_payload("b.example.com");
        assert_ne!(a, b);
        assert_eq!(
            String::from_utf8(a).unwrap(),
            r#"{"did":"did:wba:example.com:user:alice","nonce":"n1","service":"a.example.com","timestamp":"2024-12-05T12:34:56Z"}"#
        );
    }

    #[test]
    fn test_to_header_layout() {
        let mut cred = credential();
        assert_eq!(
            cred.to_header(),
            r#"DIDWba did="did:wba:example.com:user:alice", nonce="n1", timestamp="2024-12-05T12:34:56Z", verification_method="key-1", signature="c2ln""#
        );

        cred.verification_method = None;
        assert!(!cred.to_header().contains("verification_method"));
    }
}
