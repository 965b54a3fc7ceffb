// src/auth/mod.rs
//! Stateless pieces of the authentication pipeline: header parsing and
//! timestamp freshness.

pub mod header;
pub mod timestamp;

pub use header::parse_authorization;
pub use timestamp::verify_timestamp;
