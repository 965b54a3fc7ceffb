// src/models/mod.rs
//! Data structures shared by the parser, the services and the server.

pub mod credential;
pub mod did;
