// src/services/token_service.rs
//! Short-lived bearer tokens for authenticated DIDs.
//!
//! After a successful DIDWba authentication the service mints an RS256 JWT
//! `{sub, iat, exp}` that the client can present as `Bearer <token>` until it
//! expires. Tokens are stateless: validity is decided by signature and expiry
//! alone, and there is no revocation.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::AuthError;
use crate::utils::clock::Clock;

/// JWT payload of an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated DID
    pub sub: String,
    /// Issued at, seconds since the Unix epoch
    pub iat: i64,
    /// Expires at, seconds since the Unix epoch
    pub exp: i64,
}

/// Issues and verifies bearer tokens with the process-wide RSA key pair.
///
/// The key pair is loaded once at startup; a service that cannot load it must
/// not start.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Builds the service from PEM-encoded RSA keys.
    ///
    /// # Arguments
    /// * `private_pem` - PKCS#1 or PKCS#8 private key
    /// * `public_pem` - SPKI or PKCS#1 public key
    /// * `lifetime` - Validity of issued tokens
    /// * `clock` - Time source for `iat`, `exp` and expiry checks
    ///
    /// # Errors
    /// `SigningUnavailable` if either key cannot be parsed.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem).map_err(|e| {
            error!("JWT private key is not a valid RSA PEM: {}", e);
            AuthError::SigningUnavailable
        })?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem).map_err(|e| {
            error!("JWT public key is not a valid RSA PEM: {}", e);
            AuthError::SigningUnavailable
        })?;

        Ok(Self {
            encoding_key,
            decoding_key,
            lifetime,
            clock,
        })
    }

    /// Loads the key pair from PEM files.
    ///
    /// # Errors
    /// `SigningUnavailable` if a file is missing, unreadable or not a valid key.
    pub fn from_pem_files(
        private_key_path: &Path,
        public_key_path: &Path,
        lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let private_pem = read_key(private_key_path)?;
        let public_pem = read_key(public_key_path)?;
        let service = Self::from_pem(&private_pem, &public_pem, lifetime, clock)?;
        info!(
            "Loaded JWT key pair from {} and {}",
            private_key_path.display(),
            public_key_path.display()
        );
        Ok(service)
    }

    /// Mints a token for `did`.
    ///
    /// # Errors
    /// `SigningUnavailable` if signing fails.
    pub fn issue(&self, did: &str) -> Result<String, AuthError> {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            sub: did.to_string(),
            iat: now,
            exp: now + self.lifetime.num_seconds(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key).map_err(
            |e| {
                error!("Failed to sign token for {}: {}", did, e);
                AuthError::SigningUnavailable
            },
        )?;
        info!("Generated JWT token for DID: {}", did);
        Ok(token)
    }

    /// Verifies a token and returns its claims.
    ///
    /// Expiry is checked against the service clock with no leeway; a token is
    /// valid up to and including its `exp` second.
    ///
    /// # Errors
    /// - `TokenExpired` if the signature is good but `exp` has passed
    /// - `TokenInvalid` for any other defect (bad signature, wrong algorithm,
    ///   malformed token, missing claims)
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                kind => {
                    warn!("Invalid token: {:?}", kind);
                    AuthError::TokenInvalid
                }
            }
        })?;

        if self.clock.now().timestamp() > data.claims.exp {
            warn!("Token for {} has expired", data.claims.sub);
            return Err(AuthError::TokenExpired);
        }
        Ok(data.claims)
    }

    /// Lifetime of issued tokens.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, AuthError> {
    std::fs::read(path).map_err(|e| {
        error!("Cannot read JWT key file {}: {}", path.display(), e);
        AuthError::SigningUnavailable
    })
}
