//! Password reset
//!
//! Phase one mails a one-time link for an account's email. Phase two claims
//! the link's token under a row lock and swaps the password hash in the same
//! transaction that marks the token used.

use chrono::Utc;
use session_common::auth::{generate_opaque_token, hash_password, validate_password_strength};
use session_common::AppError;
use session_core::entities::PasswordResetToken;
use session_core::value_objects::TokenHash;
use session_core::DomainError;
use tracing::{info, instrument, warn};

use crate::mail::MailMessage;

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Returned while an earlier link for the same email is still outstanding
pub const ACTIVE_LINK_MESSAGE: &str =
    "an active link has already been sent to your mail, for new token wait for sometime";

/// Returned when the presented reset token matches no record
pub const UNKNOWN_TOKEN_MESSAGE: &str = "no rows with this token";

const RESET_SUBJECT: &str = "Password Reset";

/// Forgot-password and update-password orchestration
pub struct PasswordResetFlow<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PasswordResetFlow<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Issue a reset token for `email` and mail its link in the background
    ///
    /// Fails with not-found for unknown emails and with a conflict while a
    /// previous token for the email is unused and unexpired.
    #[instrument(skip(self, email))]
    pub async fn request_reset(&self, email: &str) -> ServiceResult<()> {
        let user_id = self
            .ctx
            .user_repo()
            .find_id_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("user with email", email))?;

        let now = Utc::now();
        if let Some(active) = self
            .ctx
            .password_reset_repo()
            .find_active_by_email(email, now)
            .await?
        {
            info!(%user_id, expires_at = %active.expires_at, "Reset already outstanding");
            return Err(ServiceError::conflict(ACTIVE_LINK_MESSAGE));
        }

        let config = self.ctx.password_reset_config();
        let ttl = config
            .token_ttl()
            .ok_or_else(|| ServiceError::internal("password reset TTL is out of range"))?;
        let raw_token = generate_opaque_token();
        let token = PasswordResetToken::new(
            user_id,
            email.to_string(),
            TokenHash::of(&raw_token),
            now,
            ttl,
        );

        // A concurrent request may have inserted between the check and here
        self.ctx
            .password_reset_repo()
            .insert(&token)
            .await
            .map_err(|e| match e {
                DomainError::ResetTokenActive => ServiceError::conflict(ACTIVE_LINK_MESSAGE),
                other => ServiceError::from(other),
            })?;

        let body = format!(
            "Your password reset link is ready : {}\nThis link is valid for {} mins.",
            config.reset_link(&raw_token),
            config.token_ttl_secs / 60
        );
        self.ctx
            .mail()
            .dispatch(MailMessage::new(vec![email.to_string()], RESET_SUBJECT, body));

        info!(%user_id, "Password reset requested");
        Ok(())
    }

    /// Consume a reset token and replace the owner's password
    ///
    /// Either both the password hash and the token's used flag change, or
    /// neither does.
    #[instrument(skip_all)]
    pub async fn complete_reset(&self, raw_token: &str, new_password: &str) -> ServiceResult<()> {
        validate_password_strength(new_password)?;
        let password_hash = hash_password(new_password)?;
        let token_hash = TokenHash::of(raw_token);

        let mut tx = self.ctx.password_reset_repo().begin_reset().await?;

        let Some(record) = tx.claim_for_update(&token_hash).await? else {
            warn!(token = %token_hash, "Reset failed: unknown token");
            return Err(AppError::NotFound(UNKNOWN_TOKEN_MESSAGE.to_string()).into());
        };

        if !record.is_active_at(Utc::now()) {
            warn!(
                user_id = %record.user_id,
                used = record.used,
                "Reset failed: token spent"
            );
            return Err(ServiceError::unauthorized(AppError::ResetTokenSpent));
        }

        tx.update_password_hash(record.user_id, &password_hash)
            .await?;
        tx.mark_used(&token_hash).await?;
        tx.commit().await?;

        info!(user_id = %record.user_id, "Password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MailDispatcher;
    use crate::testing::{MemoryCredentialStore, RecordingMailer};
    use chrono::Duration;
    use session_common::auth::verify_password;
    use session_common::PasswordResetConfig;
    use session_core::entities::NewUser;
    use session_core::traits::{PasswordResetRepository, UserRepository};
    use std::sync::Arc;

    const OLD_PASSWORD_HASH: &str = "old-hash";
    const NEW_PASSWORD: &str = "N3wPassword";

    struct Fixture {
        store: MemoryCredentialStore,
        mailer: RecordingMailer,
        ctx: ServiceContext,
    }

    async fn setup() -> Fixture {
        let store = MemoryCredentialStore::new();
        let mailer = RecordingMailer::new();
        let ctx = store
            .context_builder()
            .mail(MailDispatcher::new(
                Arc::new(mailer.clone()),
                MailDispatcher::DEFAULT_TIMEOUT,
            ))
            .password_reset(PasswordResetConfig {
                frontend_domain: "https://todo.example.com".to_string(),
                ..PasswordResetConfig::default()
            })
            .build()
            .unwrap();
        store
            .create(&NewUser::new(
                "heidi".to_string(),
                "heidi@example.com".to_string(),
                OLD_PASSWORD_HASH.to_string(),
            ))
            .await
            .unwrap();
        Fixture { store, mailer, ctx }
    }

    fn token_from(message: &MailMessage) -> String {
        let start = message.body.find("token=").unwrap() + "token=".len();
        message.body[start..]
            .split_whitespace()
            .next()
            .unwrap()
            .to_string()
    }

    async fn requested_token(fx: &Fixture) -> String {
        PasswordResetFlow::new(&fx.ctx)
            .request_reset("heidi@example.com")
            .await
            .unwrap();
        let sent = fx.mailer.wait_for(1).await;
        token_from(sent.last().unwrap())
    }

    #[tokio::test]
    async fn test_request_reset_mails_link_and_stores_hash_only() {
        let fx = setup().await;
        let raw = requested_token(&fx).await;

        let sent = fx.mailer.sent();
        assert_eq!(sent[0].to, vec!["heidi@example.com".to_string()]);
        assert_eq!(sent[0].subject, "Password Reset");
        assert!(sent[0]
            .body
            .contains("https://todo.example.com/reset-password?token="));
        assert!(sent[0].body.contains("valid for 15 mins"));

        let active = fx
            .store
            .find_active_by_email("heidi@example.com", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.token_hash, TokenHash::of(&raw));
        assert_ne!(active.token_hash.as_str(), raw);
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email() {
        let fx = setup().await;

        let err = PasswordResetFlow::new(&fx.ctx)
            .request_reset("nobody@example.com")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fx.store.reset_token_count(), 0);
    }

    #[tokio::test]
    async fn test_second_request_within_window_conflicts() {
        let fx = setup().await;
        let flow = PasswordResetFlow::new(&fx.ctx);

        flow.request_reset("heidi@example.com").await.unwrap();
        let err = flow.request_reset("heidi@example.com").await.unwrap_err();

        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), format!("Conflict: {ACTIVE_LINK_MESSAGE}"));
        assert_eq!(fx.store.reset_token_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_create_one_token() {
        let fx = setup().await;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ctx = fx.ctx.clone();
            handles.push(tokio::spawn(async move {
                PasswordResetFlow::new(&ctx)
                    .request_reset("heidi@example.com")
                    .await
                    .is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(fx.store.reset_token_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_reset_is_single_use() {
        let fx = setup().await;
        let raw = requested_token(&fx).await;
        let flow = PasswordResetFlow::new(&fx.ctx);

        flow.complete_reset(&raw, NEW_PASSWORD).await.unwrap();
        let stored = fx.store.password_hash_of("heidi").unwrap();
        assert_ne!(stored, NEW_PASSWORD);
        assert!(verify_password(NEW_PASSWORD, &stored).unwrap());

        let err = flow
            .complete_reset(&raw, "An0therPassword")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "RESET_TOKEN_SPENT");
        assert_eq!(fx.store.password_hash_of("heidi").unwrap(), stored);
    }

    #[tokio::test]
    async fn test_concurrent_completions_have_one_winner() {
        let fx = setup().await;
        let raw = requested_token(&fx).await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let ctx = fx.ctx.clone();
            let raw = raw.clone();
            handles.push(tokio::spawn(async move {
                PasswordResetFlow::new(&ctx)
                    .complete_reset(&raw, &format!("Passw0rd{i}"))
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_complete_reset_unknown_token() {
        let fx = setup().await;

        let err = PasswordResetFlow::new(&fx.ctx)
            .complete_reset("not-a-real-token", NEW_PASSWORD)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(fx.store.password_hash_of("heidi").unwrap(), OLD_PASSWORD_HASH);
    }

    #[tokio::test]
    async fn test_complete_reset_expired_token() {
        let fx = setup().await;
        let user_id = fx
            .store
            .find_id_by_email("heidi@example.com")
            .await
            .unwrap()
            .unwrap();
        let issued = Utc::now() - Duration::minutes(20);
        fx.store
            .insert(&PasswordResetToken::new(
                user_id,
                "heidi@example.com".to_string(),
                TokenHash::of("stale"),
                issued,
                Duration::minutes(15),
            ))
            .await
            .unwrap();

        let err = PasswordResetFlow::new(&fx.ctx)
            .complete_reset("stale", NEW_PASSWORD)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(fx.store.password_hash_of("heidi").unwrap(), OLD_PASSWORD_HASH);
    }

    #[tokio::test]
    async fn test_weak_password_leaves_token_unused() {
        let fx = setup().await;
        let raw = requested_token(&fx).await;
        let flow = PasswordResetFlow::new(&fx.ctx);

        let err = flow.complete_reset(&raw, "weak").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        flow.complete_reset(&raw, NEW_PASSWORD).await.unwrap();
    }
}
