// src/wallet/key_management.rs
//! Client-side key management for DIDWba authentication.
//!
//! A [`KeyManager`] owns one secp256k1 key bound to a DID and verification
//! method fragment. It can:
//! - publish the matching DID document
//! - sign arbitrary messages (SHA-256 prehash, ECDSA)
//! - produce ready-to-send `Authorization: DIDWba ...` headers
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 curve (via `k256` crate)
//! - SHA-256 hashing (via `ring`)
//! - Cryptographically secure random nonces (via `rand`)

use chrono::{DateTime, SecondsFormat, Utc};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use rand::Rng;

use crate::models::credential::Credential;
use crate::models::did::{AuthenticationEntry, DidDocument, Jwk, VerificationMethod};
use crate::utils::crypto::{encode_base64url, sha256};

/// Secure key holder for one DID verification method.
///
/// # Security Notes
/// - The secret key is never exposed
/// - Signatures are deterministic (RFC 6979) and low-S normalized
#[derive(Clone)]
pub struct KeyManager {
    /// DID this key signs for
    did: String,
    /// Verification method fragment, without `#`
    fragment: String,
    /// Securely stored private key (never exposed)
    signing_key: SigningKey,
}

impl KeyManager {
    /// Generates a KeyManager with a fresh random key.
    ///
    /// # Arguments
    /// * `did` - DID the key will be published under
    /// * `fragment` - Verification method fragment, e.g. "key-1"
    pub fn new(did: &str, fragment: &str) -> Self {
        Self {
            did: did.to_string(),
            fragment: fragment.trim_start_matches('#').to_string(),
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Restores a KeyManager from a raw 32-byte secret scalar.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid secp256k1 scalar.
    pub fn from_secret_bytes(did: &str, fragment: &str, secret: &[u8]) -> Result<Self, k256::ecdsa::Error> {
        Ok(Self {
            did: did.to_string(),
            fragment: fragment.trim_start_matches('#').to_string(),
            signing_key: SigningKey::from_slice(secret)?,
        })
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    /// Absolute verification method id, `did#fragment`.
    pub fn method_id(&self) -> String {
        format!("{}#{}", self.did, self.fragment)
    }

    /// Public key as a secp256k1 JWK.
    pub fn public_jwk(&self) -> Jwk {
        let point = PublicKey::from(self.signing_key.verifying_key()).to_encoded_point(false);
        Jwk {
            kty: "EC".to_string(),
            crv: "secp256k1".to_string(),
            x: point.x().map(|x| encode_base64url(x)).unwrap_or_default(),
            y: point.y().map(|y| encode_base64url(y)),
            kid: Some(self.fragment.clone()),
        }
    }

    /// DID document publishing this key for authentication.
    pub fn did_document(&self) -> DidDocument {
        DidDocument {
            id: self.did.clone(),
            verification_method: vec![VerificationMethod {
                id: self.method_id(),
                method_type: "EcdsaSecp256k1VerificationKey2019".to_string(),
                controller: Some(self.did.clone()),
                public_key_jwk: Some(self.public_jwk()),
            }],
            authentication: vec![AuthenticationEntry::Reference(self.method_id())],
        }
    }

    /// Signs a message using ECDSA (secp256k1) with SHA-256 prehashing.
    ///
    /// # Returns
    /// 64-byte compact signature (R || S)
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }

    /// Produces a signed credential for `domain` with the given nonce and
    /// timestamp.
    pub fn sign_credential(&self, domain: &str, nonce: &str, timestamp: &str) -> Credential {
        let mut credential = Credential {
            did: self.did.clone(),
            nonce: nonce.to_string(),
            timestamp: timestamp.to_string(),
            verification_method: Some(self.fragment.clone()),
            signature: String::new(),
        };
        let content_hash = sha256(&credential.signing_payload(domain));
        credential.signature = encode_base64url(&self.sign_message(&content_hash));
        credential
    }

    /// Builds an `Authorization` header value for `domain`, signed at `now`
    /// with a fresh 128-bit nonce.
    pub fn auth_header_at(&self, domain: &str, now: DateTime<Utc>) -> String {
        let nonce = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.sign_credential(domain, &nonce, &timestamp).to_header()
    }

    /// Builds an `Authorization` header value for `domain`, signed now.
    pub fn auth_header(&self, domain: &str) -> String {
        self.auth_header_at(domain, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::parse_authorization;
    use crate::models::credential::AuthScheme;

    #[test]
    fn test_public_jwk_coordinates() {
        let keys = KeyManager::from_secret_bytes("did:example:alice", "#key-1", &[0x42; 32]).unwrap();
        let jwk = keys.public_jwk();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.x.len(), 43);
        assert_eq!(jwk.y.as_deref().map(str::len), Some(43));
        assert_eq!(keys.method_id(), "did:example:alice#key-1");
    }

    #[test]
    fn test_invalid_secret_rejected() {
        assert!(KeyManager::from_secret_bytes("did:example:alice", "key-1", &[0u8; 32]).is_err());
        assert!(KeyManager::from_secret_bytes("did:example:alice", "key-1", &[1u8; 7]).is_err());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let keys = KeyManager::from_secret_bytes("did:example:alice", "key-1", &[0x42; 32]).unwrap();
        let first = keys.sign_message(b"hello");
        assert_eq!(first.len(), 64);
        assert_eq!(first, keys.sign_message(b"hello"));
        assert_ne!(first, keys.sign_message(b"world"));
    }

    #[test]
    fn test_auth_header_parses_with_fresh_nonces() {
        let keys = KeyManager::new("did:example:alice", "key-1");
        let first = keys.auth_header("svc.example.com");
        let second = keys.auth_header("svc.example.com");

        let (AuthScheme::DidWba(a), AuthScheme::DidWba(b)) = (
            parse_authorization(&first).unwrap(),
            parse_authorization(&second).unwrap(),
        ) else {
            panic!("expected DIDWba headers");
        };
        assert_eq!(a.did, "did:example:alice");
        assert_eq!(a.nonce.len(), 32);
        assert_ne!(a.nonce, b.nonce);
        assert!(a.timestamp.ends_with('Z'));
    }
}
