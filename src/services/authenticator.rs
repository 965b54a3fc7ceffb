// src/services/authenticator.rs
//! Request authentication pipeline.
//!
//! Every request that is not on the exempt list must carry either a DIDWba
//! credential or a bearer token issued by this service. DIDWba credentials go
//! through, in order:
//!
//! 1. header parsing
//! 2. timestamp freshness
//! 3. nonce replay check (the nonce is consumed here)
//! 4. DID document resolution
//! 5. signature verification against the serving domain
//! 6. bearer token issuance
//!
//! The first failing step ends the request. Bearer tokens only need a valid
//! signature and an unexpired `exp`.

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{parse_authorization, verify_timestamp};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::credential::{AuthScheme, Credential};
use crate::services::replay_guard::ReplayGuard;
use crate::services::resolver::IdentityResolver;
use crate::services::token_service::TokenService;
use crate::services::verifier::Verifier;
use crate::utils::clock::Clock;

/// Result of a successful pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The path needs no authentication
    Exempt,
    /// The caller proved control of `did`
    Authenticated {
        did: String,
        /// Freshly issued bearer token; `None` when the caller already
        /// presented one
        token: Option<String>,
    },
}

impl AuthOutcome {
    pub fn did(&self) -> Option<&str> {
        match self {
            AuthOutcome::Exempt => None,
            AuthOutcome::Authenticated { did, .. } => Some(did),
        }
    }
}

/// Orchestrates DIDWba and bearer authentication.
pub struct Authenticator {
    exempt_paths: HashSet<String>,
    /// Lowercased host names; empty accepts any
    server_domains: HashSet<String>,
    default_domain: String,
    timestamp_window: chrono::Duration,
    replay_guard: ReplayGuard,
    resolver: Arc<dyn IdentityResolver>,
    verifier: Verifier,
    tokens: Arc<TokenService>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Creates the pipeline.
    ///
    /// # Arguments
    /// * `config` - Windows, exempt paths and served domains
    /// * `resolver` - DID document source
    /// * `tokens` - Bearer token issuer/verifier
    /// * `clock` - Time source shared with `tokens`
    pub fn new(
        config: &AuthConfig,
        resolver: Arc<dyn IdentityResolver>,
        tokens: Arc<TokenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exempt_paths: config.exempt_paths.iter().cloned().collect(),
            server_domains: config
                .server_domains
                .iter()
                .map(|domain| domain.to_ascii_lowercase())
                .collect(),
            default_domain: config.domain.to_ascii_lowercase(),
            timestamp_window: config.timestamp_window(),
            replay_guard: ReplayGuard::new(config.nonce_window(), config.cleanup_interval(), clock.clone()),
            resolver,
            verifier: Verifier::new(),
            tokens,
            clock,
        }
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay_guard
    }

    /// Exact-match lookup in the exempt set.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.contains(path)
    }

    /// Domain a request was addressed to: its Host header without the port,
    /// or the configured domain when there is no Host.
    pub fn serving_domain(&self, host: Option<&str>) -> String {
        let Some(host) = host.map(str::trim).filter(|host| !host.is_empty()) else {
            return self.default_domain.clone();
        };
        let name = if host.starts_with('[') {
            // Bracketed IPv6 literal
            host.split_inclusive(']').next().unwrap_or(host)
        } else {
            match host.rsplit_once(':') {
                Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
                _ => host,
            }
        };
        name.to_ascii_lowercase()
    }

    /// Authenticates one request.
    ///
    /// Also gives the replay guard a chance to purge expired nonces, so the
    /// table is maintained by request traffic alone.
    ///
    /// # Arguments
    /// * `path` - Request path, without query
    /// * `authorization` - Raw `Authorization` header, if any
    /// * `domain` - Serving domain, see [`serving_domain`](Self::serving_domain)
    ///
    /// # Errors
    /// The [`AuthError`] of the first failing step.
    pub async fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
        domain: &str,
    ) -> Result<AuthOutcome, AuthError> {
        self.replay_guard.maybe_cleanup();

        if self.is_exempt(path) {
            debug!("Path {} is exempt from authentication", path);
            return Ok(AuthOutcome::Exempt);
        }

        let result = self.authenticate_request(authorization, domain).await;
        match &result {
            Ok(outcome) => info!(
                "Authenticated {} for {}",
                outcome.did().unwrap_or_default(),
                path
            ),
            Err(e) if e.is_server_fault() => error!("Authentication of {} failed: {}", path, e),
            Err(e) => warn!("Rejected request to {}: {}", path, e),
        }
        result
    }

    async fn authenticate_request(
        &self,
        authorization: Option<&str>,
        domain: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let header = authorization
            .map(str::trim)
            .filter(|header| !header.is_empty())
            .ok_or(AuthError::MissingAuthorization)?;
        self.check_domain(domain)?;

        match parse_authorization(header)? {
            AuthScheme::DidWba(credential) => self.authenticate_didwba(credential, domain).await,
            AuthScheme::Bearer(token) => self.authenticate_bearer(&token),
        }
    }

    fn check_domain(&self, domain: &str) -> Result<(), AuthError> {
        if self.server_domains.is_empty()
            || self.server_domains.contains(&domain.to_ascii_lowercase())
        {
            Ok(())
        } else {
            debug!("Domain {} is not served here", domain);
            Err(AuthError::DomainNotServed)
        }
    }

    async fn authenticate_didwba(
        &self,
        credential: Credential,
        domain: &str,
    ) -> Result<AuthOutcome, AuthError> {
        verify_timestamp(&credential.timestamp, self.clock.now(), self.timestamp_window)?;
        self.replay_guard
            .verify_and_record(&credential.did, &credential.nonce)?;

        let document = self.resolver.resolve(&credential.did).await?;
        let check = self.verifier.verify(&credential, &document, domain);
        if !check.valid {
            debug!("Signature check for {} failed: {}", credential.did, check.reason);
            return Err(AuthError::SignatureInvalid);
        }
        debug!("{}: {}", credential.did, check.reason);

        let token = self.tokens.issue(&credential.did)?;
        Ok(AuthOutcome::Authenticated {
            did: credential.did,
            token: Some(token),
        })
    }

    fn authenticate_bearer(&self, token: &str) -> Result<AuthOutcome, AuthError> {
        let claims = self.tokens.verify(token)?;
        Ok(AuthOutcome::Authenticated {
            did: claims.sub,
            token: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{alice, Harness, ALICE, DOMAIN};
    use chrono::Duration;

    #[tokio::test]
    async fn test_didwba_then_bearer() {
        let harness = Harness::new();
        let auth = &harness.authenticator;

        let outcome = auth
            .authenticate("/ad.json", Some(&harness.signed_header("n1")), DOMAIN)
            .await
            .unwrap();
        let AuthOutcome::Authenticated { did, token: Some(token) } = outcome else {
            panic!("expected a freshly issued token");
        };
        assert_eq!(did, ALICE);
        assert_eq!(harness.tokens.verify(&token).unwrap().sub, ALICE);

        harness.clock.advance(Duration::seconds(30));
        assert_eq!(
            auth.authenticate("/ad.json", Some(&harness.signed_header("n1")), DOMAIN)
                .await,
            Err(AuthError::NonceReused)
        );

        harness.clock.advance(Duration::minutes(4));
        let bearer = format!("Bearer {}", token);
        assert_eq!(
            auth.authenticate("/ad.json", Some(&bearer), DOMAIN).await,
            Ok(AuthOutcome::Authenticated {
                did: ALICE.to_string(),
                token: None
            })
        );
    }

    #[tokio::test]
    async fn test_expired_bearer() {
        let harness = Harness::new();
        let token = harness.tokens.issue(ALICE).unwrap();

        harness.clock.advance(Duration::seconds(301));
        assert_eq!(
            harness
                .authenticator
                .authenticate("/ad.json", Some(&format!("Bearer {}", token)), DOMAIN)
                .await,
            Err(AuthError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_exempt_and_missing_header() {
        let harness = Harness::new();
        let auth = &harness.authenticator;

        assert_eq!(auth.authenticate("/", None, DOMAIN).await, Ok(AuthOutcome::Exempt));
        assert_eq!(
            auth.authenticate("/.well-known/agent-descriptions", Some("garbage"), DOMAIN)
                .await,
            Ok(AuthOutcome::Exempt)
        );
        assert_eq!(
            auth.authenticate("/ad.json", None, DOMAIN).await,
            Err(AuthError::MissingAuthorization)
        );
        assert_eq!(
            auth.authenticate("/ad.json", Some("   "), DOMAIN).await,
            Err(AuthError::MissingAuthorization)
        );
        assert_eq!(
            auth.authenticate("/ad.json", Some("Basic dXNlcjpwdw=="), DOMAIN).await,
            Err(AuthError::UnsupportedScheme)
        );
        // Exempt matching is exact
        assert_eq!(
            auth.authenticate("/favicon.ico/x", None, DOMAIN).await,
            Err(AuthError::MissingAuthorization)
        );
    }

    #[tokio::test]
    async fn test_credential_bound_to_domain() {
        let harness = Harness::new();
        let header = alice()
            .sign_credential("a.example.com", "n1", &harness.timestamp())
            .to_header();

        assert_eq!(
            harness
                .authenticator
                .authenticate("/ad.json", Some(&header), "b.example.com")
                .await,
            Err(AuthError::SignatureInvalid)
        );
    }

    #[tokio::test]
    async fn test_stale_credential_leaves_nonce_unused() {
        let harness = Harness::new();
        let header = harness.signed_header("n1");

        harness.clock.advance(Duration::minutes(5) + Duration::seconds(1));
        assert_eq!(
            harness
                .authenticator
                .authenticate("/ad.json", Some(&header), DOMAIN)
                .await,
            Err(AuthError::TimestampInvalid)
        );
        assert!(!harness.authenticator.replay_guard().contains(ALICE, "n1"));
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let harness = Harness::new();
        harness.resolver.remove(ALICE);

        assert!(matches!(
            harness
                .authenticator
                .authenticate("/ad.json", Some(&harness.signed_header("n1")), DOMAIN)
                .await,
            Err(AuthError::ResolutionFailure(_))
        ));
        // The nonce was consumed before resolution
        assert!(harness.authenticator.replay_guard().contains(ALICE, "n1"));
    }

    #[tokio::test]
    async fn test_server_domains_restrict_hosts() {
        let harness = Harness::with_config(AuthConfig {
            domain: DOMAIN.to_string(),
            server_domains: vec![DOMAIN.to_string()],
            ..AuthConfig::default()
        });
        let auth = &harness.authenticator;

        let header = alice()
            .sign_credential("evil.example.com", "n1", &harness.timestamp())
            .to_header();
        assert_eq!(
            auth.authenticate("/ad.json", Some(&header), "evil.example.com").await,
            Err(AuthError::DomainNotServed)
        );
        assert_eq!(
            auth.authenticate("/", None, "evil.example.com").await,
            Ok(AuthOutcome::Exempt)
        );
        // A missing header is reported before the domain
        assert_eq!(
            auth.authenticate("/ad.json", None, "evil.example.com").await,
            Err(AuthError::MissingAuthorization)
        );
        assert!(auth
            .authenticate("/ad.json", Some(&harness.signed_header("n2")), DOMAIN)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_requests_drive_nonce_cleanup() {
        let harness = Harness::new();
        let auth = &harness.authenticator;

        auth.authenticate("/ad.json", Some(&harness.signed_header("n1")), DOMAIN)
            .await
            .unwrap();
        harness.clock.advance(Duration::minutes(7));

        // Any request, even an exempt one, triggers the overdue purge
        auth.authenticate("/", None, DOMAIN).await.unwrap();
        assert!(!auth.replay_guard().contains(ALICE, "n1"));
        assert_eq!(auth.replay_guard().last_cleanup(), harness.clock.now());

        // The purged nonce is only accepted again with a fresh timestamp
        auth.authenticate("/ad.json", Some(&harness.signed_header("n1")), DOMAIN)
            .await
            .unwrap();
    }

    #[test]
    fn test_serving_domain() {
        let harness = Harness::new();
        let auth = &harness.authenticator;

        assert_eq!(auth.serving_domain(Some("svc.example.com:8080")), "svc.example.com");
        assert_eq!(auth.serving_domain(Some("Svc.Example.com")), "svc.example.com");
        assert_eq!(auth.serving_domain(Some("[::1]:9870")), "[::1]");
        assert_eq!(auth.serving_domain(Some("")), DOMAIN);
        assert_eq!(auth.serving_domain(None), DOMAIN);
    }
}
