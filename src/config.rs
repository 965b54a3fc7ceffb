// src/config.rs
//! Service configuration.
//!
//! Values are layered, lowest precedence first:
//! 1. built-in defaults ([`AuthConfig::default`])
//! 2. an optional `did-auth.{toml,json,yaml}` file in the working directory
//! 3. `DID_AUTH_*` environment variables (a `.env` file is loaded by `main`)
//!
//! List values (`server_domains`, `exempt_paths`) may be given as arrays in a
//! file or as comma-separated strings anywhere.
//!
//! ## Environment Variables
//! - `DID_AUTH_DOMAIN`: fallback serving domain when a request has no Host
//! - `DID_AUTH_SERVER_DOMAINS`: allowed Host names (empty = any)
//! - `DID_AUTH_BIND_ADDR`: listen address
//! - `DID_AUTH_JWT_PRIVATE_KEY_PATH` / `DID_AUTH_JWT_PUBLIC_KEY_PATH`: RSA PEM files
//! - `DID_AUTH_TIMESTAMP_EXPIRATION_MINUTES`, `DID_AUTH_NONCE_EXPIRATION_MINUTES`
//! - `DID_AUTH_CLEANUP_INTERVAL_SECONDS`, `DID_AUTH_TOKEN_LIFETIME_SECONDS`
//! - `DID_AUTH_RESOLVER_TIMEOUT_SECONDS`, `DID_AUTH_RESOLVER_SCHEME`
//! - `DID_AUTH_EXEMPT_PATHS`: paths served without authentication

use anyhow::{bail, Context};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

const CONFIG_FILE: &str = "did-auth";
const ENV_PREFIX: &str = "DID_AUTH";

/// Runtime settings for the authentication layer and its server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Serving domain used when the request carries no Host header
    pub domain: String,
    /// Host names this process answers for; empty accepts any Host
    pub server_domains: Vec<String>,
    /// Socket address the server binds to
    pub bind_addr: String,
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    /// Maximum credential age
    pub timestamp_expiration_minutes: i64,
    /// How long consumed nonces are remembered
    pub nonce_expiration_minutes: i64,
    /// Minimum spacing between nonce purges
    pub cleanup_interval_seconds: i64,
    /// Validity of issued bearer tokens
    pub token_lifetime_seconds: i64,
    /// Timeout for DID document fetches
    pub resolver_timeout_seconds: u64,
    /// URL scheme for `did:wba` resolution ("https" outside development)
    pub resolver_scheme: String,
    /// Request paths served without authentication, matched exactly
    pub exempt_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            server_domains: Vec::new(),
            bind_addr: "127.0.0.1:9870".to_string(),
            jwt_private_key_path: PathBuf::from("doc/test_jwt_key/private_key.pem"),
            jwt_public_key_path: PathBuf::from("doc/test_jwt_key/public_key.pem"),
            timestamp_expiration_minutes: 5,
            nonce_expiration_minutes: 6,
            cleanup_interval_seconds: 60,
            token_lifetime_seconds: 300,
            resolver_timeout_seconds: 5,
            resolver_scheme: "https".to_string(),
            exempt_paths: vec![
                "/".to_string(),
                "/favicon.ico".to_string(),
                "/.well-known/agent-descriptions".to_string(),
            ],
        }
    }
}

/// A list given either as an array or as a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListValue {
    Items(Vec<String>),
    Csv(String),
}

impl ListValue {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            ListValue::Items(items) => items,
            ListValue::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    domain: String,
    server_domains: Option<ListValue>,
    bind_addr: String,
    jwt_private_key_path: PathBuf,
    jwt_public_key_path: PathBuf,
    timestamp_expiration_minutes: i64,
    nonce_expiration_minutes: i64,
    cleanup_interval_seconds: i64,
    token_lifetime_seconds: i64,
    resolver_timeout_seconds: u64,
    resolver_scheme: String,
    exempt_paths: Option<ListValue>,
}

impl AuthConfig {
    /// Loads configuration from the optional config file and the environment.
    ///
    /// # Errors
    /// Fails if a value has the wrong type or [`validate`](Self::validate)
    /// rejects the result.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX)),
        )
    }

    /// Applies defaults beneath the given sources and builds the config.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let raw: RawConfig = builder
            .set_default("domain", defaults.domain.clone())?
            .set_default("server_domains", defaults.server_domains.join(","))?
            .set_default("bind_addr", defaults.bind_addr.clone())?
            .set_default(
                "jwt_private_key_path",
                defaults.jwt_private_key_path.to_string_lossy().into_owned(),
            )?
            .set_default(
                "jwt_public_key_path",
                defaults.jwt_public_key_path.to_string_lossy().into_owned(),
            )?
            .set_default("timestamp_expiration_minutes", defaults.timestamp_expiration_minutes)?
            .set_default("nonce_expiration_minutes", defaults.nonce_expiration_minutes)?
            .set_default("cleanup_interval_seconds", defaults.cleanup_interval_seconds)?
            .set_default("token_lifetime_seconds", defaults.token_lifetime_seconds)?
            .set_default("resolver_timeout_seconds", defaults.resolver_timeout_seconds)?
            .set_default("resolver_scheme", defaults.resolver_scheme.clone())?
            .set_default("exempt_paths", defaults.exempt_paths.join(","))?
            .build()
            .context("reading configuration sources")?
            .try_deserialize()
            .context("decoding configuration")?;

        let config = Self {
            domain: raw.domain,
            server_domains: raw.server_domains.map(ListValue::into_vec).unwrap_or_default(),
            bind_addr: raw.bind_addr,
            jwt_private_key_path: raw.jwt_private_key_path,
            jwt_public_key_path: raw.jwt_public_key_path,
            timestamp_expiration_minutes: raw.timestamp_expiration_minutes,
            nonce_expiration_minutes: raw.nonce_expiration_minutes,
            cleanup_interval_seconds: raw.cleanup_interval_seconds,
            token_lifetime_seconds: raw.token_lifetime_seconds,
            resolver_timeout_seconds: raw.resolver_timeout_seconds,
            resolver_scheme: raw.resolver_scheme,
            exempt_paths: raw.exempt_paths.map(ListValue::into_vec).unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    ///
    /// The nonce window must be strictly longer than the timestamp window,
    /// otherwise a nonce could be purged while a credential carrying it is
    /// still fresh.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.domain.trim().is_empty() {
            bail!("domain must not be empty");
        }
        if self.timestamp_expiration_minutes <= 0
            || self.cleanup_interval_seconds <= 0
            || self.token_lifetime_seconds <= 0
            || self.resolver_timeout_seconds == 0
        {
            bail!("durations must be positive");
        }
        if self.nonce_expiration_minutes <= self.timestamp_expiration_minutes {
            bail!(
                "nonce_expiration_minutes ({}) must exceed timestamp_expiration_minutes ({})",
                self.nonce_expiration_minutes,
                self.timestamp_expiration_minutes
            );
        }
        if !matches!(self.resolver_scheme.as_str(), "https" | "http") {
            bail!("resolver_scheme must be http or https");
        }
        if let Some(path) = self.exempt_paths.iter().find(|path| !path.starts_with('/')) {
            bail!("exempt path {:?} must start with '/'", path);
        }
        Ok(())
    }

    pub fn timestamp_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.timestamp_expiration_minutes)
    }

    pub fn nonce_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.nonce_expiration_minutes)
    }

    pub fn cleanup_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cleanup_interval_seconds)
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_lifetime_seconds)
    }

    pub fn resolver_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.resolver_timeout_seconds)
    }
}
