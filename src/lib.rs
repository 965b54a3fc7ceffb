// src/lib.rs
//! # DID Authentication Service
//!
//! Request authentication for HTTP services using decentralized identifiers.
//!
//! Clients prove control of a DID by signing a per-request DIDWba credential
//! bound to the serving domain, a fresh nonce and a timestamp. The service
//! resolves the DID document, checks the signature, rejects replays and
//! answers with a short-lived bearer token the client can reuse until it
//! expires.
//!
//! ## Layers
//! 1. **Models**: DID documents and parsed credentials
//! 2. **Auth**: header parsing and timestamp policy
//! 3. **Services**: resolution, verification, replay protection, tokens and
//!    the orchestrating [`Authenticator`](services::authenticator::Authenticator)
//! 4. **Wallet**: client-side key holder producing DIDWba headers

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use config::AuthConfig;
pub use error::AuthError;
