//! Burp-UI JSON API server
//!
//! Exposes the status and configuration of one or more burp backup servers
//! over HTTP, filtered by per-user access control.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod filter;
pub mod metrics;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod tls;

#[cfg(test)]
mod testing;

pub use config::ServerConfig;
