//! Token hash - SHA-256 digest under which opaque tokens are persisted
//!
//! Raw refresh and reset tokens never reach the credential store; only their
//! lowercase hex SHA-256 digest does, and that digest is the lookup key.

use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest of a raw token (64 characters)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    /// Hash a raw token value
    pub fn of(raw: &str) -> Self {
        let digest = Sha256::digest(raw.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Wrap a digest loaded back from storage
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the hex digest
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the hex digest
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

// Only a prefix is shown so digests do not end up verbatim in logs.
impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "TokenHash({prefix}…)")
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
