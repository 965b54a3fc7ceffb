// src/models/did.rs
//! Decentralized Identifier (DID) document model.
//!
//! Covers the subset of the [DID Core Specification](https://www.w3.org/TR/did-core/)
//! the authentication layer reads: the document `id`, its verification methods
//! and the `authentication` relationship. Unknown members (`@context`,
//! `service`, ...) are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// A resolved DID document.
///
/// # DID Format
/// ```text
/// did:<method>:<method-specific-id>
/// ```
///
/// # Security Considerations
/// - The `id` must equal the DID that was resolved; the verifier rejects
///   documents describing a different subject
/// - Documents are fetched per request and never cached
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The complete DID string identifier
    /// Example: "did:wba:example.com:user:alice"
    pub id: String,

    /// Keys published by the subject
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,

    /// Methods authorized for authentication, by reference or embedded
    #[serde(default)]
    pub authentication: Vec<AuthenticationEntry>,
}

/// One published key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Absolute (`did:...#key-1`) or relative (`#key-1`) method id
    pub id: String,

    /// Suite name, e.g. "EcdsaSecp256k1VerificationKey2019"
    #[serde(rename = "type")]
    pub method_type: String,

    /// DID of the key controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// Key material as a JSON Web Key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Jwk>,
}

/// Entry of the `authentication` relationship.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AuthenticationEntry {
    /// Reference to an entry of `verificationMethod`
    Reference(String),
    /// A method defined inline
    Embedded(VerificationMethod),
}

/// Public JSON Web Key (RFC 7517), restricted to EC and OKP keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Jwk {
    /// Key type: "EC" or "OKP"
    pub kty: String,
    /// Curve: "secp256k1" or "Ed25519"
    pub crv: String,
    /// base64url x coordinate (or the raw Ed25519 key)
    pub x: String,
    /// base64url y coordinate, EC keys only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl VerificationMethod {
    /// Returns true if this method's id names `fragment` for the document `did`.
    ///
    /// Accepts `did#fragment`, `#fragment`, or any id ending in `#fragment`.
    pub fn matches_fragment(&self, did: &str, fragment: &str) -> bool {
        let fragment = fragment.trim_start_matches('#');
        match self.id.rsplit_once('#') {
            Some((prefix, frag)) => frag == fragment && (prefix.is_empty() || prefix == did),
            None => false,
        }
    }
}

impl DidDocument {
    /// All verification methods available for authentication.
    ///
    /// Embedded `authentication` entries come first, followed by every entry of
    /// `verificationMethod`.
    pub fn authentication_methods(&self) -> Vec<&VerificationMethod> {
        let embedded = self.authentication.iter().filter_map(|entry| match entry {
            AuthenticationEntry::Embedded(method) => Some(method),
            AuthenticationEntry::Reference(_) => None,
        });
        embedded.chain(self.verification_method.iter()).collect()
    }

    /// Methods whose id carries the given fragment.
    pub fn find_methods(&self, fragment: &str) -> Vec<&VerificationMethod> {
        self.authentication_methods()
            .into_iter()
            .filter(|method| method.matches_fragment(&self.id, fragment))
            .collect()
    }
}
