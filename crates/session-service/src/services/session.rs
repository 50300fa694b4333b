//! Session management
//!
//! Signup, login and refresh-token rotation. A refresh token moves through
//! issued -> (rotated-away | revoked | expired); only an issued token can be
//! exchanged, and the exchange revokes it in the same storage transaction
//! that records its replacement.

use chrono::Utc;
use session_common::auth::{
    hash_password, validate_password_strength, verify_dummy, verify_password, TokenPair,
    TokenSubject,
};
use session_common::AppError;
use session_core::entities::{NewUser, RefreshTokenRecord, User};
use session_core::value_objects::TokenHash;
use tracing::{info, instrument, warn};

use crate::dto::{LoginRequest, SignupRequest};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Tokens handed back after a successful login or refresh
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Session manager
pub struct SessionManager<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SessionManager<'a> {
    /// Create a new SessionManager
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a new user
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<User> {
        validate_password_strength(&request.password)?;

        let password_hash = hash_password(&request.password)?;
        let new_user = NewUser::new(request.username, request.email, password_hash);

        let user = self.ctx.user_repo().create(&new_user).await.map_err(|e| {
            if e.is_conflict() {
                warn!(reason = %e, "Signup rejected");
            }
            ServiceError::from(e)
        })?;

        info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Verify credentials and open a new session
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<IssuedSession> {
        let Some(credentials) = self
            .ctx
            .user_repo()
            .find_credentials(&request.username)
            .await?
        else {
            verify_dummy(&request.password);
            warn!("Login failed: user not found");
            return Err(ServiceError::unauthorized(AppError::InvalidCredentials));
        };

        if !verify_password(&request.password, &credentials.password_hash)? {
            warn!(user_id = %credentials.user.id, "Login failed: invalid password");
            return Err(ServiceError::unauthorized(AppError::InvalidCredentials));
        }

        let user = credentials.user;
        let tokens = self.issue(&user)?;
        let record = RefreshTokenRecord::new(
            user.id,
            TokenHash::of(&tokens.refresh_token),
            tokens.refresh_expires_at,
        );
        self.ctx.refresh_token_repo().insert(&record).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(IssuedSession { user, tokens })
    }

    /// Exchange a refresh token for a new token pair
    ///
    /// The presented token is single-use: a second exchange fails because its
    /// record is revoked by the first.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<IssuedSession> {
        let old_hash = TokenHash::of(refresh_token);

        let record = self
            .ctx
            .refresh_token_repo()
            .find_by_hash(&old_hash)
            .await?
            .ok_or_else(|| {
                warn!(token = %old_hash, "Refresh failed: unknown token");
                ServiceError::unauthorized(AppError::InvalidToken)
            })?;

        let claims = self
            .ctx
            .token_issuer()
            .validate_refresh_token(refresh_token)
            .map_err(|e| {
                warn!(token = %old_hash, reason = %e, "Refresh failed: token rejected");
                ServiceError::unauthorized(e)
            })?;

        if !record.is_usable_at(Utc::now()) {
            let err = if record.revoked {
                warn!(user_id = %record.user_id, "Refresh failed: token already revoked");
                AppError::SessionRevoked
            } else {
                warn!(user_id = %record.user_id, "Refresh failed: record expired");
                AppError::TokenExpired
            };
            return Err(ServiceError::unauthorized(err));
        }

        let user = self
            .ctx
            .user_repo()
            .find_by_username(&claims.username)
            .await?
            .filter(|user| user.id == record.user_id && user.id == claims.user_id())
            .ok_or_else(|| {
                warn!(user_id = %record.user_id, "Refresh failed: user no longer exists");
                ServiceError::unauthorized(AppError::InvalidToken)
            })?;

        let tokens = self.issue(&user)?;
        let replacement = RefreshTokenRecord::new(
            user.id,
            TokenHash::of(&tokens.refresh_token),
            tokens.refresh_expires_at,
        );

        if !self
            .ctx
            .refresh_token_repo()
            .rotate(&old_hash, &replacement)
            .await?
        {
            warn!(user_id = %user.id, "Refresh failed: lost rotation race");
            return Err(ServiceError::unauthorized(AppError::SessionRevoked));
        }

        info!(user_id = %user.id, "Session rotated");
        Ok(IssuedSession { user, tokens })
    }

    fn issue(&self, user: &User) -> ServiceResult<TokenPair> {
        let subject = TokenSubject::new(user.id, user.username.clone());
        Ok(self.ctx.token_issuer().issue_pair(&subject)?)
    }
}
