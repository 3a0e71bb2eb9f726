// ===============================
// src/lib.rs
// ===============================
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod normalize;
pub mod payload;
pub mod proxy;
pub mod server;
pub mod signer;
