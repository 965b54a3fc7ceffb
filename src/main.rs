// src/main.rs

//! # DID Authentication Service - Main Entry Point
//!
//! Loads configuration, wires the authentication pipeline and starts the API
//! server.
//!
//! ## Architecture Overview
//! 1. **Resolution**: `HttpDidResolver` fetches `did:wba` documents
//! 2. **Tokens**: `TokenService` signs RS256 bearer tokens
//! 3. **Pipeline**: `Authenticator` combines both with replay protection
//! 4. **Server**: `ApiServer` runs the pipeline in front of every route
//!
//! See [`did_auth_service::config`] for the environment variables.

use anyhow::Context;
use did_auth_service::config::AuthConfig;
use did_auth_service::services::api_server::ApiServer;
use did_auth_service::services::authenticator::Authenticator;
use did_auth_service::services::resolver::HttpDidResolver;
use did_auth_service::services::token_service::TokenService;
use did_auth_service::utils::clock::{Clock, SystemClock};
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and configuration
/// 2. Load the JWT key pair (the service refuses to start without it)
/// 3. Initialize service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AuthConfig::load().context("loading configuration")?;
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind_addr {:?}", config.bind_addr))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tokens = TokenService::from_pem_files(
        &config.jwt_private_key_path,
        &config.jwt_public_key_path,
        config.token_lifetime(),
        clock.clone(),
    )
    .context("loading JWT key pair")?;

    let resolver = HttpDidResolver::new(config.resolver_timeout())
        .context("initializing DID resolver")?
        .with_scheme(&config.resolver_scheme);

    let authenticator = Authenticator::new(&config, Arc::new(resolver), Arc::new(tokens), clock);

    info!(
        "Serving domain {} (timestamp window {}m, nonce window {}m)",
        config.domain, config.timestamp_expiration_minutes, config.nonce_expiration_minutes
    );
    info!("Exempt paths: {:?}", config.exempt_paths);

    ApiServer::new(Arc::new(authenticator)).run(addr).await
}
