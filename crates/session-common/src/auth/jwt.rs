//! Token issuance for authentication
//!
//! Access and refresh tokens share one signed format (HS256 with a single
//! secret) and differ only in `token_type` and lifetime. The refresh token is
//! additionally tracked server-side by its hash so it can be revoked.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use session_core::UserId;
use uuid::Uuid;

use crate::error::AppError;

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token id; keeps two tokens minted in the same second distinct
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    /// Get the user ID as a typed value
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::new(self.user_id)
    }

    /// Check if the token is expired at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// Check if this is an access token
    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    /// Check if this is a refresh token
    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh
    }
}

/// Identity a token pair is minted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: UserId,
    pub username: String,
}

impl TokenSubject {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

/// Token pair containing access and refresh tokens
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

/// Longest lifetime accepted for any token or link (100 years)
pub const MAX_LIFETIME_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Lifetime of `secs` seconds, or `None` unless `0 < secs <= MAX_LIFETIME_SECS`
///
/// Within that range `now + lifetime` stays representable for any realistic
/// `now`, so expiry arithmetic on requests cannot overflow.
#[must_use]
pub fn checked_lifetime(secs: i64) -> Option<Duration> {
    if secs <= 0 || secs > MAX_LIFETIME_SECS {
        return None;
    }
    Duration::try_seconds(secs)
}

/// Mints and verifies signed tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer with the given secret and expiry times (seconds)
    ///
    /// # Errors
    /// Returns `AppError::Config` if the secret is empty or a TTL is outside
    /// `1..=MAX_LIFETIME_SECS`
    pub fn new(
        secret: &str,
        access_token_expiry: i64,
        refresh_token_expiry: i64,
    ) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Config("JWT secret must not be empty".to_string()));
        }
        let lifetime = |secs: i64| {
            checked_lifetime(secs).ok_or_else(|| {
                AppError::Config(format!(
                    "token lifetime {secs}s must be between 1 and {MAX_LIFETIME_SECS} seconds"
                ))
            })
        };
        let access_ttl = lifetime(access_token_expiry)?;
        let refresh_ttl = lifetime(refresh_token_expiry)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    /// Access token lifetime
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access + refresh token pair for a subject
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AppError> {
        self.issue_pair_at(subject, Utc::now())
    }

    /// Issue a token pair as if the current time were `now`
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue_pair_at(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.encode_token(subject, TokenType::Access, now)?;
        let refresh_token = self.encode_token(subject, TokenType::Refresh, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
            refresh_expires_at: expiry(now, self.refresh_ttl)?,
        })
    }

    fn encode_token(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl(),
            TokenType::Refresh => self.refresh_ttl(),
        };

        let claims = Claims {
            username: subject.username.clone(),
            user_id: subject.user_id.into_inner(),
            exp: expiry(now, ttl)?.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode JWT: {e}")))
    }

    /// Decode and verify a token (signature, algorithm and expiry)
    ///
    /// # Errors
    /// Returns `TokenExpired` for an expired token, `InvalidToken` otherwise
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                    _ => AppError::InvalidToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Validate an access token and return the claims
    ///
    /// # Errors
    /// Returns an error if the token is invalid, expired, or not an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;

        if !claims.is_access_token() {
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }

    /// Validate a refresh token and return the claims
    ///
    /// # Errors
    /// Returns an error if the token is invalid, expired, or not a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;

        if !claims.is_refresh_token() {
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AppError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token expiry out of range")))
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_secs", &self.access_ttl.num_seconds())
            .field("refresh_ttl_secs", &self.refresh_ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret-key-that-is-long-enough", 900, 604_800).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject::new(UserId::new(42), "alice")
    }

    #[test]
    fn test_rejects_empty_secret() {
        let result = TokenIssuer::new("", 900, 604_800);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_lifetimes() {
        for (access, refresh) in [
            (0, 604_800),
            (900, -1),
            (900, i64::MAX / 100),
            (i64::MAX, 604_800),
            (900, MAX_LIFETIME_SECS + 1),
        ] {
            let result = TokenIssuer::new("test-secret", access, refresh);
            assert!(
                matches!(result, Err(AppError::Config(_))),
                "accepted access={access} refresh={refresh}"
            );
        }
    }

    #[test]
    fn test_longest_lifetime_issues_without_overflow() {
        let issuer = TokenIssuer::new("test-secret", 900, MAX_LIFETIME_SECS).unwrap();
        let pair = issuer.issue_pair(&subject()).unwrap();

        let claims = issuer.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_LIFETIME_SECS);
        assert!(pair.refresh_expires_at > Utc::now());
    }

    #[test]
    fn test_checked_lifetime() {
        assert_eq!(checked_lifetime(900), Some(Duration::seconds(900)));
        assert_eq!(checked_lifetime(0), None);
        assert_eq!(checked_lifetime(-5), None);
        assert_eq!(checked_lifetime(i64::MAX / 100), None);
    }

    #[test]
    fn test_issue_pair() {
        let issuer = create_test_issuer();
        let now = Utc::now();

        let pair = issuer.issue_pair_at(&subject(), now).unwrap();

        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.refresh_expires_at, now + Duration::seconds(604_800));
    }

    #[test]
    fn test_access_claims_carry_identity() {
        let issuer = create_test_issuer();
        let pair = issuer.issue_pair(&subject()).unwrap();

        let claims = issuer.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.user_id(), UserId::new(42));
        assert_eq!(claims.exp - claims.iat, 900);
        assert!(!claims.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let issuer = create_test_issuer();
        let pair = issuer.issue_pair(&subject()).unwrap();

        assert!(issuer.validate_refresh_token(&pair.refresh_token).is_ok());
        assert!(matches!(
            issuer.validate_access_token(&pair.refresh_token),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            issuer.validate_refresh_token(&pair.access_token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_same_second_pairs_are_distinct() {
        let issuer = create_test_issuer();
        let now = Utc::now();

        let first = issuer.issue_pair_at(&subject(), now).unwrap();
        let second = issuer.issue_pair_at(&subject(), now).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[test]
    fn test_expired_token() {
        let issuer = create_test_issuer();
        let pair = issuer
            .issue_pair_at(&subject(), Utc::now() - Duration::hours(1))
            .unwrap();

        assert!(matches!(
            issuer.validate_access_token(&pair.access_token),
            Err(AppError::TokenExpired)
        ));
        // Refresh lifetime is a week, so this one is still fine
        assert!(issuer.validate_refresh_token(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let issuer = create_test_issuer();
        let other = TokenIssuer::new("another-secret-key", 900, 604_800).unwrap();
        let pair = other.issue_pair(&subject()).unwrap();

        assert!(matches!(
            issuer.decode(&pair.access_token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_algorithm_is_invalid() {
        let secret = "test-secret-key-that-is-long-enough";
        let issuer = create_test_issuer();
        let now = Utc::now().timestamp();
        let claims = Claims {
            username: "alice".to_string(),
            user_id: 42,
            exp: now + 900,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(issuer.decode(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_invalid_token() {
        let issuer = create_test_issuer();

        let result = issuer.decode("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_user_id_serialized_as_camel_case() {
        let claims = Claims {
            username: "alice".to_string(),
            user_id: 7,
            exp: 0,
            iat: 0,
            jti: "x".to_string(),
            token_type: TokenType::Refresh,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["userId"], 7);
        assert_eq!(json["token_type"], "refresh");
    }

    #[test]
    fn test_debug_hides_tokens() {
        let issuer = create_test_issuer();
        let pair = issuer.issue_pair(&subject()).unwrap();
        let debug = format!("{pair:?}");
        assert!(!debug.contains(&pair.access_token));
    }
}
