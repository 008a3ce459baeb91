//! Transport layer for the simulation.
//!
//! HTTP (REST + WebSocket push) via axum.

pub mod http;

pub use http::{ServerConfig, serve, serve_listener};
