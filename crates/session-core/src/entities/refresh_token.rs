//! Refresh token record - server-side bookkeeping for one issued refresh token
//!
//! Lifecycle: issued -> (rotated-away | revoked | expired). Only an issued
//! record (not revoked, not expired) can be exchanged for a new pair.

use chrono::{DateTime, Utc};

use crate::value_objects::{TokenHash, UserId};

/// One issued refresh token, keyed by the hash of its raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: UserId,
    pub token_hash: TokenHash,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Create a fresh (non-revoked) record
    pub fn new(user_id: UserId, token_hash: TokenHash, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash,
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        }
    }

    /// Check if the record has expired at `now`
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the record can still be rotated at `now`
    #[inline]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}
