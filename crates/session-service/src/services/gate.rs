//! Access-token gate for protected routes
//!
//! Resolves an `Authorization: Bearer <token>` header to a current user. The
//! username carried by the token is looked up on every request, so deleting a
//! user invalidates their outstanding access tokens immediately.

use chrono::{DateTime, Utc};
use session_common::AppError;
use session_core::entities::User;
use session_core::value_objects::UserId;
use tracing::{debug, instrument, warn};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

const BEARER_SCHEME: &str = "Bearer";

/// Identity resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Request-boundary authentication
pub struct AuthGate<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthGate<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Verify the raw `Authorization` header value and resolve its user
    #[instrument(skip_all)]
    pub async fn authenticate(&self, header: Option<&str>) -> ServiceResult<AuthenticatedUser> {
        let header = header.ok_or(ServiceError::unauthorized(AppError::MissingAuth))?;
        let token = bearer_token(header)?;

        let claims = self
            .ctx
            .token_issuer()
            .validate_access_token(token)
            .map_err(|e| {
                debug!(reason = %e, "Access token rejected");
                ServiceError::unauthorized(e)
            })?;

        if claims.is_expired_at(Utc::now()) {
            return Err(ServiceError::unauthorized(AppError::TokenExpired));
        }

        let user = self
            .ctx
            .user_repo()
            .find_by_username(&claims.username)
            .await?
            .filter(|user| user.id == claims.user_id())
            .ok_or_else(|| {
                warn!(user_id = claims.user_id, "token is not linked to any real user");
                ServiceError::unauthorized(AppError::InvalidToken)
            })?;

        Ok(AuthenticatedUser::from(user))
    }
}

/// Split `"Bearer <token>"` into its token; anything else is malformed
fn bearer_token(header: &str) -> ServiceResult<&str> {
    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if *scheme == BEARER_SCHEME && !token.is_empty() => Ok(token),
        _ => Err(ServiceError::unauthorized(AppError::InvalidAuthHeader)),
    }
}
