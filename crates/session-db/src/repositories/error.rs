//! Error handling utilities for repositories

use session_core::error::DomainError;
use session_core::value_objects::UserId;
use sqlx::Error as SqlxError;

/// Unique constraint names declared by the migrations
pub const USERS_USERNAME_KEY: &str = "users_username_key";
pub const USERS_EMAIL_KEY: &str = "users_email_key";

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce(Option<&str>) -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique(db_err.constraint());
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// Pick the conflict variant for a duplicate user row
pub fn user_conflict(constraint: Option<&str>) -> DomainError {
    match constraint {
        Some(USERS_USERNAME_KEY) => DomainError::UsernameAlreadyExists,
        Some(USERS_EMAIL_KEY) => DomainError::EmailAlreadyExists,
        _ => DomainError::UsernameAlreadyExists,
    }
}

/// Create a "user not found" error
pub fn user_not_found(id: UserId) -> DomainError {
    DomainError::UserNotFound(id.to_string())
}
