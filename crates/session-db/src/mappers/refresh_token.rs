//! Refresh token record <-> model mapper

use chrono::{DateTime, Utc};
use session_core::entities::RefreshTokenRecord;
use session_core::value_objects::{TokenHash, UserId};

use crate::models::RefreshTokenModel;

impl From<RefreshTokenModel> for RefreshTokenRecord {
    fn from(model: RefreshTokenModel) -> Self {
        RefreshTokenRecord {
            user_id: UserId::new(model.user_id),
            token_hash: TokenHash::from_stored(model.token_hash),
            expires_at: model.expires_at,
            revoked: model.revoked,
            created_at: model.created_at,
        }
    }
}

/// Bind values for inserting a refresh token record
pub struct RefreshTokenInsert<'a> {
    pub user_id: i64,
    pub token_hash: &'a str,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl<'a> RefreshTokenInsert<'a> {
    pub fn new(record: &'a RefreshTokenRecord) -> Self {
        Self {
            user_id: record.user_id.into_inner(),
            token_hash: record.token_hash.as_str(),
            expires_at: record.expires_at,
            revoked: record.revoked,
            created_at: record.created_at,
        }
    }
}
