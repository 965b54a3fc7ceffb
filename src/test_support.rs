// src/test_support.rs
//! Fixtures shared by the unit tests.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::authenticator::Authenticator;
use crate::services::resolver::StaticResolver;
use crate::services::token_service::TokenService;
use crate::utils::clock::{Clock, ManualClock};
use crate::wallet::key_management::KeyManager;

pub const PRIVATE_KEY: &str = include_str!("../doc/test_jwt_key/private_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../doc/test_jwt_key/public_key.pem");

pub const DOMAIN: &str = "svc.example.com";
pub const ALICE: &str = "did:example:alice";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 5, 12, 0, 0).unwrap()
}

/// Alice's deterministic signing key.
pub fn alice() -> KeyManager {
    KeyManager::from_secret_bytes(ALICE, "key-1", &[0x42; 32]).unwrap()
}

/// A fully wired authenticator on a manual clock, with Alice's document
/// pinned in a static resolver.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub resolver: Arc<StaticResolver>,
    pub tokens: Arc<TokenService>,
    pub authenticator: Arc<Authenticator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig {
            domain: DOMAIN.to_string(),
            ..AuthConfig::default()
        })
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let resolver = Arc::new(StaticResolver::new().with_document(alice().did_document()));
        let tokens = Arc::new(
            TokenService::from_pem(
                PRIVATE_KEY.as_bytes(),
                PUBLIC_KEY.as_bytes(),
                config.token_lifetime(),
                clock.clone(),
            )
            .unwrap(),
        );
        let authenticator = Arc::new(Authenticator::new(
            &config,
            resolver.clone(),
            tokens.clone(),
            clock.clone(),
        ));
        Self {
            clock,
            resolver,
            tokens,
            authenticator,
        }
    }

    /// Current manual-clock time in the wire format clients send.
    pub fn timestamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// DIDWba header from Alice for [`DOMAIN`], signed now.
    pub fn signed_header(&self, nonce: &str) -> String {
        alice()
            .sign_credential(DOMAIN, nonce, &self.timestamp())
            .to_header()
    }
}
