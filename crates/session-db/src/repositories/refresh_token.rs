//! PostgreSQL implementation of RefreshTokenRepository

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tracing::{debug, instrument};

use session_core::entities::RefreshTokenRecord;
use session_core::error::DomainError;
use session_core::traits::{RefreshTokenRepository, RepoResult};
use session_core::value_objects::TokenHash;

use crate::mappers::RefreshTokenInsert;
use crate::models::RefreshTokenModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of RefreshTokenRepository
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    /// Create a new PgRefreshTokenRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a record on any executor (pool or open transaction)
async fn insert_record<'e, E>(executor: E, record: &RefreshTokenRecord) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let insert = RefreshTokenInsert::new(record);

    sqlx::query(
        r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at, revoked, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(insert.user_id)
    .bind(insert.token_hash)
    .bind(insert.expires_at)
    .bind(insert.revoked)
    .bind(insert.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_unique_violation(e, |_| DomainError::TokenHashExists))?;

    Ok(())
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    async fn insert(&self, record: &RefreshTokenRecord) -> RepoResult<()> {
        insert_record(&self.pool, record).await
    }

    #[instrument(skip(self))]
    async fn find_by_hash(&self, token_hash: &TokenHash) -> RepoResult<Option<RefreshTokenRecord>> {
        let result = sqlx::query_as::<_, RefreshTokenModel>(
            r"
            SELECT id, user_id, token_hash, expires_at, revoked, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(RefreshTokenRecord::from))
    }

    #[instrument(skip(self))]
    async fn revoke_by_hash(&self, token_hash: &TokenHash) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE token_hash = $1 AND revoked = FALSE
            ",
        )
        .bind(token_hash.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, replacement), fields(user_id = %replacement.user_id))]
    async fn rotate(
        &self,
        old_hash: &TokenHash,
        replacement: &RefreshTokenRecord,
    ) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // A concurrent rotation of the same row blocks here until the first
        // commits, then re-checks `revoked` and matches nothing.
        let revoked = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE token_hash = $1 AND revoked = FALSE AND expires_at > NOW()
            ",
        )
        .bind(old_hash.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if revoked.rows_affected() == 0 {
            debug!("Refresh token not rotatable");
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(false);
        }

        insert_record(&mut *tx, replacement).await?;
        tx.commit().await.map_err(map_db_error)?;

        Ok(true)
    }
}
