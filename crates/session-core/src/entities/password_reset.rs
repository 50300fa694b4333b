//! Password reset token - one-time credential for setting a new password

use chrono::{DateTime, Duration, Utc};

use crate::value_objects::{TokenHash, UserId};

/// A password reset token record
///
/// At most one *active* (unused and unexpired) record per email is allowed at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub user_id: UserId,
    pub email: String,
    pub token_hash: TokenHash,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordResetToken {
    /// Default lifetime of a reset link
    pub const DEFAULT_TTL_SECS: i64 = 15 * 60;

    /// Create an unused token valid for `ttl` from `now`
    pub fn new(
        user_id: UserId,
        email: String,
        token_hash: TokenHash,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id,
            email,
            token_hash,
            created_at: now,
            expires_at: now + ttl,
            used: false,
        }
    }

    /// Check if the token has expired at `now`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the token is still outstanding (unused and unexpired)
    #[inline]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(now: DateTime<Utc>) -> PasswordResetToken {
        PasswordResetToken::new(
            UserId::new(5),
            "dana@example.com".to_string(),
            TokenHash::of("raw"),
            now,
            Duration::seconds(PasswordResetToken::DEFAULT_TTL_SECS),
        )
    }

    #[test]
    fn test_new_token_expires_after_ttl() {
        let now = Utc::now();
        let token = token(now);
        assert_eq!(token.expires_at - token.created_at, Duration::minutes(15));
        assert!(token.is_active_at(now));
        assert!(token.is_active_at(now + Duration::minutes(14)));
        assert!(!token.is_active_at(now + Duration::minutes(15)));
    }

    #[test]
    fn test_used_token_is_inactive() {
        let now = Utc::now();
        let mut token = token(now);
        token.used = true;
        assert!(!token.is_active_at(now));
        assert!(!token.is_expired_at(now));
    }
}
