//! Repository traits (ports) - define the interface for credential storage
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation. Services hold these as `Arc<dyn Trait>` so
//! a Postgres store and an in-memory store are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Credentials, NewUser, PasswordResetToken, RefreshTokenRecord, User};
use crate::error::DomainError;
use crate::value_objects::{TokenHash, UserId};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by exact username
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;

    /// Find user plus stored password hash by exact username
    async fn find_credentials(&self, username: &str) -> RepoResult<Option<Credentials>>;

    /// Resolve a user id from an email address
    async fn find_id_by_email(&self, email: &str) -> RepoResult<Option<UserId>>;

    /// Create a new user
    ///
    /// Fails with `UsernameAlreadyExists` / `EmailAlreadyExists` on duplicates.
    async fn create(&self, user: &NewUser) -> RepoResult<User>;

    /// Replace the stored password hash
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
}

// ============================================================================
// Refresh Token Repository
// ============================================================================

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Record a freshly issued refresh token
    async fn insert(&self, record: &RefreshTokenRecord) -> RepoResult<()>;

    /// Look up a record by token hash (regardless of state)
    async fn find_by_hash(&self, token_hash: &TokenHash) -> RepoResult<Option<RefreshTokenRecord>>;

    /// Mark a record revoked; returns `false` if no record matched
    async fn revoke_by_hash(&self, token_hash: &TokenHash) -> RepoResult<bool>;

    /// Atomically revoke `old_hash` and insert `replacement`
    ///
    /// Returns `false` (and changes nothing) when the old record is missing,
    /// already revoked or expired. Two concurrent rotations of the same token
    /// must not both return `true`.
    async fn rotate(
        &self,
        old_hash: &TokenHash,
        replacement: &RefreshTokenRecord,
    ) -> RepoResult<bool>;
}

// ============================================================================
// Password Reset Repository
// ============================================================================

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Persist a new reset token record
    ///
    /// Fails with `ResetTokenActive` if the email already has a token that is
    /// unused and unexpired as of `token.created_at`. The check and the insert
    /// are serialized per email.
    async fn insert(&self, token: &PasswordResetToken) -> RepoResult<()>;

    /// Find the unused, unexpired token for an email, if any
    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<PasswordResetToken>>;

    /// Open a unit of work for consuming a reset token
    async fn begin_reset(&self) -> RepoResult<Box<dyn ResetTransaction>>;
}

/// Unit of work for completing a password reset
///
/// Nothing is visible to other readers until [`ResetTransaction::commit`].
/// Dropping the transaction without committing discards all writes.
#[async_trait]
pub trait ResetTransaction: Send {
    /// Load a reset token by hash, locking it against concurrent completion
    async fn claim_for_update(
        &mut self,
        token_hash: &TokenHash,
    ) -> RepoResult<Option<PasswordResetToken>>;

    /// Replace the user's password hash inside the transaction
    async fn update_password_hash(&mut self, id: UserId, password_hash: &str) -> RepoResult<()>;

    /// Flag the reset token as consumed inside the transaction
    async fn mark_used(&mut self, token_hash: &TokenHash) -> RepoResult<()>;

    /// Make all writes visible atomically
    async fn commit(self: Box<Self>) -> RepoResult<()>;
}

// ============================================================================
// Store Health
// ============================================================================

/// Liveness probe for the backing store (readiness checks)
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Succeeds if the store can serve queries right now
    async fn ping(&self) -> RepoResult<()>;
}
