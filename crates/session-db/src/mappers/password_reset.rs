//! Password reset token <-> model mapper

use chrono::{DateTime, Utc};
use session_core::entities::PasswordResetToken;
use session_core::value_objects::{TokenHash, UserId};

use crate::models::PasswordResetTokenModel;

impl From<PasswordResetTokenModel> for PasswordResetToken {
    fn from(model: PasswordResetTokenModel) -> Self {
        PasswordResetToken {
            user_id: UserId::new(model.user_id),
            email: model.email,
            token_hash: TokenHash::from_stored(model.token_hash),
            created_at: model.created_at,
            expires_at: model.expires_at,
            used: model.used,
        }
    }
}

/// Bind values for inserting a reset token
pub struct ResetTokenInsert<'a> {
    pub user_id: i64,
    pub email: &'a str,
    pub token_hash: &'a str,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl<'a> ResetTokenInsert<'a> {
    pub fn new(token: &'a PasswordResetToken) -> Self {
        Self {
            user_id: token.user_id.into_inner(),
            email: &token.email,
            token_hash: token.token_hash.as_str(),
            created_at: token.created_at,
            expires_at: token.expires_at,
            used: token.used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_model_to_entity() {
        let now = Utc::now();
        let model = PasswordResetTokenModel {
            id: 1,
            user_id: 9,
            email: "erin@example.com".to_string(),
            token_hash: TokenHash::of("raw").into_inner(),
            created_at: now,
            expires_at: now + Duration::minutes(15),
            used: false,
        };

        let token = PasswordResetToken::from(model);
        assert_eq!(token.user_id, UserId::new(9));
        assert_eq!(token.token_hash, TokenHash::of("raw"));
        assert!(token.is_active_at(now));
    }
}
