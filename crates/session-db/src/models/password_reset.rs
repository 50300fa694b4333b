//! Password reset token database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for password_reset_tokens table
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetTokenModel {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}
