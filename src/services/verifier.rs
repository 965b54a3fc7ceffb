// src/services/verifier.rs
//! DIDWba signature verification.
//!
//! Rebuilds the canonical payload the client was required to sign
//! (`{did, nonce, service, timestamp}`, with `service` set to the domain the
//! request arrived on), hashes it with SHA-256 and checks the credential's
//! signature against the keys published in the caller's DID document.
//!
//! Supported verification methods, keyed by `publicKeyJwk`:
//! - `EcdsaSecp256k1VerificationKey2019` / `JsonWebKey2020` with an EC
//!   secp256k1 key: ECDSA with SHA-256 over the payload digest, signature
//!   encoded as 64-byte `r || s`
//! - `Ed25519VerificationKey2018` / `Ed25519VerificationKey2020` /
//!   `JsonWebKey2020` with an OKP Ed25519 key: Ed25519 over the payload digest

use ed25519_dalek::Verifier as _;
use log::debug;

use crate::models::credential::Credential;
use crate::models::did::{DidDocument, Jwk, VerificationMethod};
use crate::utils::crypto::{decode_base64url, sha256};

const SECP256K1_TYPES: [&str; 2] = ["EcdsaSecp256k1VerificationKey2019", "JsonWebKey2020"];
const ED25519_TYPES: [&str; 3] = [
    "Ed25519VerificationKey2018",
    "Ed25519VerificationKey2020",
    "JsonWebKey2020",
];

/// Result of a signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheck {
    pub valid: bool,
    /// Human-readable explanation, for logs
    pub reason: String,
}

impl SignatureCheck {
    fn valid(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// A public key usable for DIDWba signatures.
#[derive(Debug, Clone)]
pub enum VerificationKey {
    Secp256k1(k256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerificationKey {
    /// Extracts the key from a verification method.
    ///
    /// # Errors
    /// A description of why the method is unusable (unknown type, missing or
    /// malformed JWK, curve mismatch).
    pub fn from_method(method: &VerificationMethod) -> Result<Self, String> {
        let jwk = method
            .public_key_jwk
            .as_ref()
            .ok_or_else(|| format!("{} has no publicKeyJwk", method.id))?;
        let method_type = method.method_type.as_str();

        match (jwk.kty.as_str(), jwk.crv.as_str()) {
            ("EC", "secp256k1") if SECP256K1_TYPES.contains(&method_type) => {
                Self::secp256k1_from_jwk(jwk)
            }
            ("OKP", "Ed25519") if ED25519_TYPES.contains(&method_type) => {
                Self::ed25519_from_jwk(jwk)
            }
            (kty, crv) => Err(format!(
                "unsupported key {}/{} for method type {}",
                kty, crv, method_type
            )),
        }
    }

    fn secp256k1_from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let x = decode_coordinate(&jwk.x)?;
        let y = decode_coordinate(jwk.y.as_deref().ok_or("EC key without y coordinate")?)?;

        let mut sec1 = Vec::with_capacity(65);
        sec1.push(0x04);
        sec1.extend_from_slice(&x);
        sec1.extend_from_slice(&y);

        k256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
            .map(VerificationKey::Secp256k1)
            .map_err(|e| format!("invalid secp256k1 point: {}", e))
    }

    fn ed25519_from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let x = decode_coordinate(&jwk.x)?;
        ed25519_dalek::VerifyingKey::from_bytes(&x)
            .map(VerificationKey::Ed25519)
            .map_err(|e| format!("invalid Ed25519 key: {}", e))
    }

    /// Checks `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            VerificationKey::Secp256k1(key) => {
                let parsed = match signature.len() {
                    64 => k256::ecdsa::Signature::from_slice(signature),
                    _ => k256::ecdsa::Signature::from_der(signature),
                };
                let Ok(parsed) = parsed else {
                    return false;
                };
                // Signers other than RustCrypto do not always emit low-S
                let parsed = parsed.normalize_s().unwrap_or(parsed);
                key.verify(message, &parsed).is_ok()
            }
            VerificationKey::Ed25519(key) => {
                let Ok(parsed) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(message, &parsed).is_ok()
            }
        }
    }
}

/// Verifies DIDWba credentials against resolved DID documents.
#[derive(Debug, Default, Clone)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Checks that `credential` was signed for `domain` by a key in `document`.
    ///
    /// If the credential names a verification method only that method is
    /// tried; otherwise every authentication-capable method is tried until one
    /// accepts the signature.
    ///
    /// # Arguments
    /// * `credential` - Parsed DIDWba header
    /// * `document` - DID document resolved for `credential.did`
    /// * `domain` - Domain the request was addressed to
    pub fn verify(
        &self,
        credential: &Credential,
        document: &DidDocument,
        domain: &str,
    ) -> SignatureCheck {
        if document.id != credential.did {
            return SignatureCheck::invalid(format!(
                "DID mismatch: credential {} but document {}",
                credential.did, document.id
            ));
        }

        let Ok(signature) = decode_base64url(&credential.signature) else {
            return SignatureCheck::invalid("signature is not base64url");
        };

        let candidates = match &credential.verification_method {
            Some(fragment) => document.find_methods(fragment),
            None => document.authentication_methods(),
        };
        if candidates.is_empty() {
            return SignatureCheck::invalid(match &credential.verification_method {
                Some(fragment) => format!("verification method {} not found", fragment),
                None => "document has no verification methods".to_string(),
            });
        }

        let content_hash = sha256(&credential.signing_payload(domain));
        for method in candidates {
            match VerificationKey::from_method(method) {
                Ok(key) if key.verify(&content_hash, &signature) => {
                    return SignatureCheck::valid(format!("verified with {}", method.id));
                }
                Ok(_) => debug!("Signature does not match {}", method.id),
                Err(reason) => debug!("Skipping {}: {}", method.id, reason),
            }
        }

        SignatureCheck::invalid("signature verification failed")
    }
}

fn decode_coordinate(value: &str) -> Result<[u8; 32], String> {
    let bytes = decode_base64url(value).map_err(|e| format!("bad base64url in JWK: {}", e))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("JWK coordinate is {} bytes, expected 32", bytes.len()))
}
