//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers, making HTTP requests and
//! reading the refresh cookie back out of responses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use session_api::{create_app_state, serve, AppState};
use session_common::AppConfig;
use session_service::testing::{MemoryCredentialStore, RecordingMailer, TEST_JWT_SECRET};
use session_service::MailDispatcher;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Name of the refresh token cookie
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// Present when the server runs on the in-memory store
    pub store: Option<MemoryCredentialStore>,
    /// Captures outgoing mail when the server runs on the in-memory store
    pub mailer: Option<RecordingMailer>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server on the in-memory credential store
    pub async fn start() -> Result<Self> {
        let store = MemoryCredentialStore::new();
        let mailer = RecordingMailer::new();
        let ctx = store
            .context_builder()
            .mail(MailDispatcher::new(
                Arc::new(mailer.clone()),
                Duration::from_secs(1),
            ))
            .build()?;
        let config = AppConfig::local("postgres://unused", TEST_JWT_SECRET);

        let mut server = Self::start_with_state(AppState::new(ctx, config)).await?;
        server.store = Some(store);
        server.mailer = Some(mailer);
        Ok(server)
    }

    /// Start a server on PostgreSQL configured from the environment
    pub async fn start_postgres() -> Result<Self> {
        let config = test_config()?;
        let state = create_app_state(config).await?;
        Self::start_with_state(state).await
    }

    /// Start a server for a prepared state
    pub async fn start_with_state(state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                rx.await.ok();
            };
            serve(listener, state, shutdown).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            store: None,
            mailer: None,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Trigger graceful shutdown and wait for the server task to finish
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(10), handle).await??;
        }
        Ok(())
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a PATCH request with JSON body
    pub async fn patch<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.patch(&url).json(body).send().await?)
    }

    /// Exchange a refresh token carried in the cookie
    pub async fn refresh(&self, refresh_token: &str) -> Result<Response> {
        let url = format!("{}/users/refresh", self.base_url());
        Ok(self
            .client
            .post(&url)
            .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
            .send()
            .await?)
    }

    /// Raw token from the most recent reset link mailed by the server
    pub async fn last_reset_token(&self, expected_mails: usize) -> Result<String> {
        let mailer = self
            .mailer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("server does not capture mail"))?;
        let sent = mailer.wait_for(expected_mails).await;
        let message = sent
            .last()
            .ok_or_else(|| anyhow::anyhow!("no mail was delivered"))?;
        reset_token_from(&message.body)
            .ok_or_else(|| anyhow::anyhow!("mail carries no reset link: {}", message.body))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

/// Create a test configuration
pub fn test_config() -> Result<AppConfig> {
    // Load from environment or use defaults
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {e}"))?;

    Ok(config)
}

/// Helper to check if a PostgreSQL test environment is available
pub fn check_test_env() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    if std::env::var("JWT_SECRET").is_err() {
        eprintln!("Skipping test: JWT_SECRET not set");
        return false;
    }

    true
}

/// Full `Set-Cookie` line for the refresh cookie, if the response set one
pub fn refresh_set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.starts_with(&format!("{REFRESH_COOKIE}=")))
        .map(str::to_string)
}

/// Refresh token value carried by the response's `Set-Cookie`
pub fn refresh_cookie_value(response: &Response) -> Option<String> {
    let cookie = refresh_set_cookie(response)?;
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
}

/// Extract the `token` query parameter from a mailed reset link
pub fn reset_token_from(body: &str) -> Option<String> {
    let start = body.find("token=")? + "token=".len();
    let token: String = body[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '&')
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_token_from_link() {
        let body = "Your password reset link is ready : http://localhost:3000/reset-password?token=abc123\nThis link is valid for 15 mins.";
        assert_eq!(reset_token_from(body).as_deref(), Some("abc123"));
        assert_eq!(reset_token_from("no link here"), None);
    }
}
