//! Entity to DTO mappers
//!
//! Implements `From` conversions from domain values to response DTOs.

use session_core::entities::User;

use super::responses::{CurrentUserResponse, SignupResponse, TokenResponse};
use crate::services::{AuthenticatedUser, IssuedSession};

// ============================================================================
// User Mappers
// ============================================================================

impl From<&User> for SignupResponse {
    fn from(user: &User) -> Self {
        Self::new(user.username.clone())
    }
}

impl From<AuthenticatedUser> for CurrentUserResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            id: user.user_id.into_inner(),
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

// ============================================================================
// Session Mappers
// ============================================================================

impl From<&IssuedSession> for TokenResponse {
    fn from(session: &IssuedSession) -> Self {
        Self {
            token: session.tokens.access_token.clone(),
        }
    }
}
