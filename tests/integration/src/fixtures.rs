//! Test fixtures and data generators
//!
//! Provides reusable request bodies and response shapes for integration tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Password that satisfies the strength policy
pub const STRONG_PASSWORD: &str = "TestPass123";

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Signup request
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Fresh account with a process-unique username and email
    ///
    /// The process id keeps runs against a shared database apart.
    pub fn unique() -> Self {
        let suffix = format!("{}x{}", std::process::id(), unique_suffix());
        Self {
            username: format!("user{suffix}"),
            email: format!("user{suffix}@example.com"),
            password: STRONG_PASSWORD.to_string(),
        }
    }
}

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn from_signup(signup: &SignupRequest) -> Self {
        Self {
            username: signup.username.clone(),
            password: signup.password.clone(),
        }
    }

    pub fn with_password(signup: &SignupRequest, password: &str) -> Self {
        Self {
            username: signup.username.clone(),
            password: password.to_string(),
        }
    }
}

/// Forgot password request
#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Update password request
#[derive(Debug, Serialize)]
pub struct UpdatePasswordRequest {
    pub new_password: String,
}

/// Signup response
#[derive(Debug, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub username: String,
}

/// Access token response from login and refresh
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Plain message response
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Current user response
#[derive(Debug, Deserialize)]
pub struct CurrentUserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Error envelope
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
