// src/services/mod.rs
//! Authentication services and the HTTP server that runs them.

pub mod api_server;
pub mod authenticator;
pub mod replay_guard;
pub mod resolver;
pub mod token_service;
pub mod verifier;
