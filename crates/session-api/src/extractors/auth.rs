//! Authentication extractor
//!
//! Runs the access-token gate on the `Authorization` header and hands the
//! resolved identity to the handler.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use session_common::AppError;
use session_service::{AuthGate, AuthenticatedUser};

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated user resolved from a bearer access token
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedUser);

impl std::ops::Deref for AuthUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| {
                tracing::warn!("Non-ASCII Authorization header");
                ApiError::App(AppError::InvalidAuthHeader)
            })?),
            None => None,
        };

        let app_state = AppState::from_ref(state);
        let user = AuthGate::new(app_state.service_context())
            .authenticate(header)
            .await?;

        Ok(AuthUser(user))
    }
}
