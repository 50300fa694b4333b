//! Service context - dependency container for services
//!
//! Holds the credential store ports, the token issuer, the mail dispatcher and
//! password reset settings needed by services.

use std::sync::Arc;

use session_common::auth::TokenIssuer;
use session_common::PasswordResetConfig;
use session_core::traits::{
    PasswordResetRepository, RefreshTokenRepository, StoreHealth, UserRepository,
};

use crate::mail::MailDispatcher;

use super::error::{ServiceError, ServiceResult};

/// Service context containing all dependencies
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct ServiceContext {
    // Credential store
    user_repo: Arc<dyn UserRepository>,
    refresh_token_repo: Arc<dyn RefreshTokenRepository>,
    password_reset_repo: Arc<dyn PasswordResetRepository>,
    store_health: Arc<dyn StoreHealth>,

    // Collaborators
    token_issuer: Arc<TokenIssuer>,
    mail: MailDispatcher,

    // Settings
    password_reset: Arc<PasswordResetConfig>,
}

impl ServiceContext {
    /// Start building a context
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Credential Store ===

    /// Get the user repository
    pub fn user_repo(&self) -> &dyn UserRepository {
        self.user_repo.as_ref()
    }

    /// Get the refresh token repository
    pub fn refresh_token_repo(&self) -> &dyn RefreshTokenRepository {
        self.refresh_token_repo.as_ref()
    }

    /// Get the password reset repository
    pub fn password_reset_repo(&self) -> &dyn PasswordResetRepository {
        self.password_reset_repo.as_ref()
    }

    /// Get the store health probe
    pub fn store_health(&self) -> &dyn StoreHealth {
        self.store_health.as_ref()
    }

    // === Collaborators ===

    /// Get the token issuer
    pub fn token_issuer(&self) -> &TokenIssuer {
        self.token_issuer.as_ref()
    }

    /// Get the mail dispatcher
    pub fn mail(&self) -> &MailDispatcher {
        &self.mail
    }

    // === Settings ===

    /// Get the password reset link settings
    pub fn password_reset_config(&self) -> &PasswordResetConfig {
        self.password_reset.as_ref()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("token_issuer", &self.token_issuer)
            .field("mail", &self.mail)
            .field("password_reset", &self.password_reset)
            .finish()
    }
}

/// Builder for creating ServiceContext
pub struct ServiceContextBuilder {
    user_repo: Option<Arc<dyn UserRepository>>,
    refresh_token_repo: Option<Arc<dyn RefreshTokenRepository>>,
    password_reset_repo: Option<Arc<dyn PasswordResetRepository>>,
    store_health: Option<Arc<dyn StoreHealth>>,
    token_issuer: Option<Arc<TokenIssuer>>,
    mail: Option<MailDispatcher>,
    password_reset: PasswordResetConfig,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            user_repo: None,
            refresh_token_repo: None,
            password_reset_repo: None,
            store_health: None,
            token_issuer: None,
            mail: None,
            password_reset: PasswordResetConfig::default(),
        }
    }

    pub fn user_repo(mut self, repo: Arc<dyn UserRepository>) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn refresh_token_repo(mut self, repo: Arc<dyn RefreshTokenRepository>) -> Self {
        self.refresh_token_repo = Some(repo);
        self
    }

    pub fn password_reset_repo(mut self, repo: Arc<dyn PasswordResetRepository>) -> Self {
        self.password_reset_repo = Some(repo);
        self
    }

    pub fn store_health(mut self, probe: Arc<dyn StoreHealth>) -> Self {
        self.store_health = Some(probe);
        self
    }

    pub fn token_issuer(mut self, issuer: Arc<TokenIssuer>) -> Self {
        self.token_issuer = Some(issuer);
        self
    }

    pub fn mail(mut self, dispatcher: MailDispatcher) -> Self {
        self.mail = Some(dispatcher);
        self
    }

    pub fn password_reset(mut self, config: PasswordResetConfig) -> Self {
        self.password_reset = config;
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        if self.password_reset.token_ttl().is_none() {
            return Err(ServiceError::validation("password reset TTL is out of range"));
        }

        Ok(ServiceContext {
            user_repo: self
                .user_repo
                .ok_or_else(|| ServiceError::validation("user_repo is required"))?,
            refresh_token_repo: self
                .refresh_token_repo
                .ok_or_else(|| ServiceError::validation("refresh_token_repo is required"))?,
            password_reset_repo: self
                .password_reset_repo
                .ok_or_else(|| ServiceError::validation("password_reset_repo is required"))?,
            store_health: self
                .store_health
                .ok_or_else(|| ServiceError::validation("store_health is required"))?,
            token_issuer: self
                .token_issuer
                .ok_or_else(|| ServiceError::validation("token_issuer is required"))?,
            mail: self
                .mail
                .ok_or_else(|| ServiceError::validation("mail is required"))?,
            password_reset: Arc::new(self.password_reset),
        })
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
