// src/wallet/mod.rs
//! Client-side signing support.

pub mod key_management;
