//! PostgreSQL implementation of PasswordResetRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use session_core::entities::PasswordResetToken;
use session_core::error::DomainError;
use session_core::traits::{PasswordResetRepository, RepoResult, ResetTransaction};
use session_core::value_objects::{TokenHash, UserId};

use crate::mappers::ResetTokenInsert;
use crate::models::PasswordResetTokenModel;

use super::error::{map_db_error, map_unique_violation, user_not_found};

/// PostgreSQL implementation of PasswordResetRepository
#[derive(Clone)]
pub struct PgPasswordResetRepository {
    pool: PgPool,
}

impl PgPasswordResetRepository {
    /// Create a new PgPasswordResetRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for PgPasswordResetRepository {
    #[instrument(skip(self, token), fields(user_id = %token.user_id))]
    async fn insert(&self, token: &PasswordResetToken) -> RepoResult<()> {
        let insert = ResetTokenInsert::new(token);
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Serialize issuance per email for the rest of this transaction
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(insert.email)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO password_reset_tokens (user_id, email, token_hash, created_at, expires_at, used)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM password_reset_tokens
                WHERE email = $2 AND used = FALSE AND expires_at > $4
            )
            ",
        )
        .bind(insert.user_id)
        .bind(insert.email)
        .bind(insert.token_hash)
        .bind(insert.created_at)
        .bind(insert.expires_at)
        .bind(insert.used)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, |_| DomainError::TokenHashExists))?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(map_db_error)?;
            return Err(DomainError::ResetTokenActive);
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<PasswordResetToken>> {
        let result = sqlx::query_as::<_, PasswordResetTokenModel>(
            r"
            SELECT id, user_id, email, token_hash, created_at, expires_at, used
            FROM password_reset_tokens
            WHERE email = $1 AND used = FALSE AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(PasswordResetToken::from))
    }

    async fn begin_reset(&self) -> RepoResult<Box<dyn ResetTransaction>> {
        let tx = self.pool.begin().await.map_err(map_db_error)?;
        Ok(Box::new(PgResetTransaction { tx }))
    }
}

/// Open transaction for consuming a reset token
///
/// Dropping it without `commit` rolls back (sqlx issues the ROLLBACK when the
/// connection is returned to the pool).
pub struct PgResetTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ResetTransaction for PgResetTransaction {
    #[instrument(skip(self))]
    async fn claim_for_update(
        &mut self,
        token_hash: &TokenHash,
    ) -> RepoResult<Option<PasswordResetToken>> {
        let result = sqlx::query_as::<_, PasswordResetTokenModel>(
            r"
            SELECT id, user_id, email, token_hash, created_at, expires_at, used
            FROM password_reset_tokens
            WHERE token_hash = $1
            FOR UPDATE
            ",
        )
        .bind(token_hash.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(PasswordResetToken::from))
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_hash(&mut self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET password_hash = $2
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .bind(password_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_used(&mut self, token_hash: &TokenHash) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ResetTokenNotFound);
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await.map_err(map_db_error)
    }
}
