//! Route definitions
//!
//! Every `/users` route sits behind the per-client rate limiter; health
//! probes do not.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::handlers::{health, password, session, users};
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create the main API router with all routes
pub fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(user_routes(state))
}

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

/// Session, password reset and profile routes
fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(session::signup))
        .route("/users/login", post(session::login))
        .route("/users/refresh", post(session::refresh))
        .route("/users/forgot-password", post(password::forgot_password))
        .route("/users/update-password", patch(password::update_password))
        .route("/users/me", get(users::get_current_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
}
