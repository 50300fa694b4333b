//! # session-api
//!
//! HTTP surface built with Axum: session and password-reset endpoints, the
//! bearer-token gate and per-client rate limiting.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_app, create_app_state, run, run_server, serve, shutdown_signal};
pub use state::AppState;
