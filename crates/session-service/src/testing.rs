//! In-memory credential store and mail doubles
//!
//! Used by this crate's unit tests and, through the `testing` feature, by the
//! API crate and the end-to-end suite. The store honours the same atomicity
//! rules as the Postgres repositories: rotation is all-or-nothing, reset
//! inserts are checked and applied under one lock, and reset completions are
//! serialized and staged until commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use session_common::auth::TokenIssuer;
use session_core::entities::{Credentials, NewUser, PasswordResetToken, RefreshTokenRecord, User};
use session_core::traits::{
    PasswordResetRepository, RefreshTokenRepository, RepoResult, ResetTransaction, StoreHealth,
    UserRepository,
};
use session_core::value_objects::{TokenHash, UserId};
use session_core::DomainError;
use tokio::sync::OwnedMutexGuard;

use crate::mail::{LogMailer, MailDispatcher, MailError, MailMessage, Mailer};
use crate::services::ServiceContextBuilder;

/// Signing secret used by [`MemoryCredentialStore::context_builder`]
pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

/// Token issuer with a 15 minute access TTL and a 7 day refresh TTL
pub fn test_token_issuer() -> TokenIssuer {
    match TokenIssuer::new(TEST_JWT_SECRET, 900, 604_800) {
        Ok(issuer) => issuer,
        Err(e) => unreachable!("static issuer settings are valid: {e}"),
    }
}

// ============================================================================
// Credential Store
// ============================================================================

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<UserRow>,
    next_user_id: i64,
    refresh_tokens: HashMap<TokenHash, RefreshTokenRecord>,
    reset_tokens: Vec<PasswordResetToken>,
}

impl MemoryState {
    fn user_mut(&mut self, id: UserId) -> RepoResult<&mut UserRow> {
        self.users
            .iter_mut()
            .find(|row| row.user.id == id)
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }
}

/// Credential store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    state: Arc<Mutex<MemoryState>>,
    reset_lock: Arc<tokio::sync::Mutex<()>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context builder wired to this store, a test issuer and a log mailer
    pub fn context_builder(&self) -> ServiceContextBuilder {
        let store = Arc::new(self.clone());
        ServiceContextBuilder::new()
            .user_repo(store.clone())
            .refresh_token_repo(store.clone())
            .password_reset_repo(store.clone())
            .store_health(store)
            .token_issuer(Arc::new(test_token_issuer()))
            .mail(MailDispatcher::new(
                Arc::new(LogMailer::default()),
                MailDispatcher::DEFAULT_TIMEOUT,
            ))
    }

    /// Stored password hash for a username
    pub fn password_hash_of(&self, username: &str) -> Option<String> {
        self.state
            .lock()
            .users
            .iter()
            .find(|row| row.user.username == username)
            .map(|row| row.password_hash.clone())
    }

    /// Delete a user and everything it owns
    pub fn remove_user(&self, username: &str) -> bool {
        let mut state = self.state.lock();
        let Some(pos) = state
            .users
            .iter()
            .position(|row| row.user.username == username)
        else {
            return false;
        };
        let id = state.users.remove(pos).user.id;
        state.refresh_tokens.retain(|_, record| record.user_id != id);
        state.reset_tokens.retain(|token| token.user_id != id);
        true
    }

    /// Number of reset token records ever stored
    pub fn reset_token_count(&self) -> usize {
        self.state.lock().reset_tokens.len()
    }

    /// Make [`StoreHealth::ping`] fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|row| row.user.username == username)
            .map(|row| row.user.clone()))
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<Credentials>> {
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|row| row.user.username == username)
            .map(|row| Credentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn find_id_by_email(&self, email: &str) -> RepoResult<Option<UserId>> {
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| row.user.id))
    }

    async fn create(&self, user: &NewUser) -> RepoResult<User> {
        let mut state = self.state.lock();
        if state.users.iter().any(|row| row.user.username == user.username) {
            return Err(DomainError::UsernameAlreadyExists);
        }
        if state.users.iter().any(|row| row.user.email == user.email) {
            return Err(DomainError::EmailAlreadyExists);
        }

        state.next_user_id += 1;
        let created = User {
            id: UserId::new(state.next_user_id),
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: Utc::now(),
        };
        state.users.push(UserRow {
            user: created.clone(),
            password_hash: user.password_hash.clone(),
        });
        Ok(created)
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        self.state.lock().user_mut(id)?.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryCredentialStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> RepoResult<()> {
        let mut state = self.state.lock();
        if state.refresh_tokens.contains_key(&record.token_hash) {
            return Err(DomainError::TokenHashExists);
        }
        state
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &TokenHash) -> RepoResult<Option<RefreshTokenRecord>> {
        Ok(self.state.lock().refresh_tokens.get(token_hash).cloned())
    }

    async fn revoke_by_hash(&self, token_hash: &TokenHash) -> RepoResult<bool> {
        let mut state = self.state.lock();
        match state.refresh_tokens.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate(
        &self,
        old_hash: &TokenHash,
        replacement: &RefreshTokenRecord,
    ) -> RepoResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();

        let usable = state
            .refresh_tokens
            .get(old_hash)
            .is_some_and(|record| record.is_usable_at(now));
        if !usable {
            return Ok(false);
        }
        if state.refresh_tokens.contains_key(&replacement.token_hash) {
            return Err(DomainError::TokenHashExists);
        }

        if let Some(old) = state.refresh_tokens.get_mut(old_hash) {
            old.revoked = true;
        }
        state
            .refresh_tokens
            .insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }
}

#[async_trait]
impl PasswordResetRepository for MemoryCredentialStore {
    async fn insert(&self, token: &PasswordResetToken) -> RepoResult<()> {
        let mut state = self.state.lock();
        if state
            .reset_tokens
            .iter()
            .any(|t| t.email == token.email && t.is_active_at(token.created_at))
        {
            return Err(DomainError::ResetTokenActive);
        }
        if state
            .reset_tokens
            .iter()
            .any(|t| t.token_hash == token.token_hash)
        {
            return Err(DomainError::TokenHashExists);
        }
        state.reset_tokens.push(token.clone());
        Ok(())
    }

    async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<PasswordResetToken>> {
        Ok(self
            .state
            .lock()
            .reset_tokens
            .iter()
            .filter(|t| t.email == email && t.is_active_at(now))
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn begin_reset(&self) -> RepoResult<Box<dyn ResetTransaction>> {
        Ok(Box::new(MemoryResetTransaction {
            store: self.clone(),
            guard: None,
            staged: Vec::new(),
        }))
    }
}

#[async_trait]
impl StoreHealth for MemoryCredentialStore {
    async fn ping(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("store unavailable".to_string()));
        }
        Ok(())
    }
}

enum StagedWrite {
    PasswordHash(UserId, String),
    MarkUsed(TokenHash),
}

/// Reset unit of work; claims are serialized store-wide and writes are
/// applied only on commit
struct MemoryResetTransaction {
    store: MemoryCredentialStore,
    guard: Option<OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
}

#[async_trait]
impl ResetTransaction for MemoryResetTransaction {
    async fn claim_for_update(
        &mut self,
        token_hash: &TokenHash,
    ) -> RepoResult<Option<PasswordResetToken>> {
        if self.guard.is_none() {
            self.guard = Some(Arc::clone(&self.store.reset_lock).lock_owned().await);
        }
        Ok(self
            .store
            .state
            .lock()
            .reset_tokens
            .iter()
            .find(|t| &t.token_hash == token_hash)
            .cloned())
    }

    async fn update_password_hash(&mut self, id: UserId, password_hash: &str) -> RepoResult<()> {
        if !self.store.state.lock().users.iter().any(|row| row.user.id == id) {
            return Err(DomainError::UserNotFound(id.to_string()));
        }
        self.staged
            .push(StagedWrite::PasswordHash(id, password_hash.to_string()));
        Ok(())
    }

    async fn mark_used(&mut self, token_hash: &TokenHash) -> RepoResult<()> {
        self.staged.push(StagedWrite::MarkUsed(token_hash.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let mut state = self.store.state.lock();
        for write in &self.staged {
            match write {
                StagedWrite::PasswordHash(id, hash) => {
                    state.user_mut(*id)?.password_hash.clone_from(hash);
                }
                StagedWrite::MarkUsed(token_hash) => {
                    if let Some(token) = state
                        .reset_tokens
                        .iter_mut()
                        .find(|t| &t.token_hash == token_hash)
                    {
                        token.used = true;
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Mail Doubles
// ============================================================================

/// Mailer that keeps every delivered message
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }

    /// Wait (up to two seconds) until at least `count` messages arrived
    pub async fn wait_for(&self, count: usize) -> Vec<MailMessage> {
        for _ in 0..400 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Mailer whose transport always fails
#[derive(Clone, Default)]
pub struct FailingMailer {
    attempts: Arc<AtomicUsize>,
}

impl FailingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MailError::Transport("connection refused".to_string()))
    }
}

/// Mailer that never completes
#[derive(Clone, Copy, Default)]
pub struct StallingMailer;

#[async_trait]
impl Mailer for StallingMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}
