//! REST API, WebSocket push and the server loop.

mod routes;
mod server;
mod websocket;

pub use routes::{AddTicketsParams, StatusResponse, routes};
pub use server::{ServerConfig, serve, serve_listener};
