//! API Integration Tests
//!
//! Most tests run against a real TCP server on the in-memory credential
//! store. The `postgres_*` tests additionally require:
//! - Running PostgreSQL instance
//! - Environment variables: DATABASE_URL, JWT_SECRET
//!
//! Run with: cargo test -p integration-tests --test api_tests

use integration_tests::{
    assert_json, assert_status, check_test_env, fixtures::*, refresh_cookie_value,
    refresh_set_cookie, TestServer,
};
use reqwest::{header, StatusCode};
use serde_json::json;

/// Sign up a fresh account and log in, returning (signup, access, refresh)
async fn signed_in(server: &TestServer) -> (SignupRequest, String, String) {
    let signup = SignupRequest::unique();
    let response = server.post("/users/signup", &signup).await.unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();

    let response = server
        .post("/users/login", &LoginRequest::from_signup(&signup))
        .await
        .unwrap();
    let refresh = refresh_cookie_value(&response).expect("login sets the refresh cookie");
    let tokens: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();

    (signup, tokens.token, refresh)
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.get("/health/ready").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_readiness_reports_store_outage() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.store.as_ref().unwrap().set_unavailable(true);

    let response = server.get("/health/ready").await.unwrap();
    assert_status(response, StatusCode::SERVICE_UNAVAILABLE)
        .await
        .unwrap();

    // Liveness does not depend on the store
    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

// ============================================================================
// Signup Tests
// ============================================================================

#[tokio::test]
async fn test_signup() {
    let server = TestServer::start().await.expect("Failed to start server");
    let request = SignupRequest::unique();

    let response = server.post("/users/signup", &request).await.unwrap();
    let body: SignupResponse = assert_json(response, StatusCode::CREATED).await.unwrap();

    assert_eq!(body.message, "Signup done successfully");
    assert_eq!(body.username, request.username);

    // Only the argon2 hash is stored
    let stored = server
        .store
        .as_ref()
        .unwrap()
        .password_hash_of(&request.username)
        .unwrap();
    assert!(stored.starts_with("$argon2"));
    assert!(!stored.contains(STRONG_PASSWORD));
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let server = TestServer::start().await.expect("Failed to start server");
    let first = SignupRequest::unique();
    server.post("/users/signup", &first).await.unwrap();

    let mut second = SignupRequest::unique();
    second.email = first.email.clone();

    let response = server.post("/users/signup", &second).await.unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::CONFLICT).await.unwrap();
    assert_eq!(error.error.code, "EMAIL_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_signup_weak_password() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut request = SignupRequest::unique();
    request.password = "alllowercase".to_string();

    let response = server.post("/users/signup", &request).await.unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

#[tokio::test]
async fn test_signup_malformed_json() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .client
        .post(format!("{}/users/signup", server.base_url()))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{\"username\": ")
        .send()
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();
    assert_eq!(error.error.code, "INVALID_BODY");
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_login_sets_refresh_cookie() {
    let server = TestServer::start().await.expect("Failed to start server");
    let signup = SignupRequest::unique();
    server.post("/users/signup", &signup).await.unwrap();

    let response = server
        .post("/users/login", &LoginRequest::from_signup(&signup))
        .await
        .unwrap();

    let cookie = refresh_set_cookie(&response).expect("refresh cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/users"));

    let tokens: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(tokens.token.split('.').count(), 3);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let server = TestServer::start().await.expect("Failed to start server");
    let signup = SignupRequest::unique();
    server.post("/users/signup", &signup).await.unwrap();

    let wrong_password = server
        .post(
            "/users/login",
            &LoginRequest::with_password(&signup, "WrongPass123"),
        )
        .await
        .unwrap();
    let wrong_password: ErrorResponse = assert_json(wrong_password, StatusCode::UNAUTHORIZED)
        .await
        .unwrap();

    let unknown_user = server
        .post(
            "/users/login",
            &LoginRequest::from_signup(&SignupRequest::unique()),
        )
        .await
        .unwrap();
    let unknown_user: ErrorResponse = assert_json(unknown_user, StatusCode::UNAUTHORIZED)
        .await
        .unwrap();

    assert_eq!(wrong_password.error.code, unknown_user.error.code);
    assert_eq!(wrong_password.error.message, unknown_user.error.message);
}

#[tokio::test]
async fn test_current_user() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (signup, access, _) = signed_in(&server).await;

    let response = server.get_auth("/users/me", &access).await.unwrap();
    let me: CurrentUserResponse = assert_json(response, StatusCode::OK).await.unwrap();

    assert!(me.id > 0);
    assert_eq!(me.username, signup.username);
    assert_eq!(me.email, signup.email);
    assert!(me.created_at <= chrono::Utc::now());
}

#[tokio::test]
async fn test_current_user_rejects_bad_credentials() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/users/me").await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();

    let response = server.get_auth("/users/me", "not-a-jwt").await.unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.error.code, "INVALID_TOKEN");
}

#[tokio::test]
async fn test_current_user_after_account_removed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (signup, access, _) = signed_in(&server).await;

    assert!(server.store.as_ref().unwrap().remove_user(&signup.username));

    let response = server.get_auth("/users/me", &access).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_refresh_rotation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (_, _, refresh) = signed_in(&server).await;

    let response = server.refresh(&refresh).await.unwrap();
    let rotated = refresh_cookie_value(&response).expect("rotated cookie");
    let tokens: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_ne!(rotated, refresh);

    // The new access token works
    let response = server.get_auth("/users/me", &tokens.token).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    // The old refresh token is spent
    let response = server.refresh(&refresh).await.unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.error.code, "SESSION_REVOKED");

    // The rotated one still works
    let response = server.refresh(&rotated).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (_, _, refresh) = signed_in(&server).await;

    let (a, b, c) = tokio::join!(
        server.refresh(&refresh),
        server.refresh(&refresh),
        server.refresh(&refresh),
    );
    let ok = [a.unwrap(), b.unwrap(), c.unwrap()]
        .iter()
        .filter(|r| r.status() == StatusCode::OK)
        .count();
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.post("/users/refresh", &json!({})).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

// ============================================================================
// Password Reset Tests
// ============================================================================

#[tokio::test]
async fn test_password_reset_flow() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (signup, _, _) = signed_in(&server).await;

    let response = server
        .post(
            "/users/forgot-password",
            &ForgotPasswordRequest {
                email: signup.email.clone(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let token = server.last_reset_token(1).await.unwrap();
    let new_password = "BrandNew456";

    let response = server
        .patch(
            &format!("/users/update-password?token={token}"),
            &UpdatePasswordRequest {
                new_password: new_password.to_string(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    // Old password is gone, new one works
    let response = server
        .post("/users/login", &LoginRequest::from_signup(&signup))
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();

    let response = server
        .post(
            "/users/login",
            &LoginRequest::with_password(&signup, new_password),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    // The link is single use
    let response = server
        .patch(
            &format!("/users/update-password?token={token}"),
            &UpdatePasswordRequest {
                new_password: "Another789x".to_string(),
            },
        )
        .await
        .unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(error.error.code, "RESET_TOKEN_SPENT");
}

#[tokio::test]
async fn test_forgot_password_is_uniform() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (signup, _, _) = signed_in(&server).await;

    let known = server
        .post(
            "/users/forgot-password",
            &ForgotPasswordRequest {
                email: signup.email.clone(),
            },
        )
        .await
        .unwrap();
    let known: MessageResponse = assert_json(known, StatusCode::OK).await.unwrap();

    let unknown = server
        .post(
            "/users/forgot-password",
            &ForgotPasswordRequest {
                email: "nobody@example.com".to_string(),
            },
        )
        .await
        .unwrap();
    let unknown: MessageResponse = assert_json(unknown, StatusCode::OK).await.unwrap();

    assert_eq!(known.message, unknown.message);

    // A live link blocks a second one
    let again = server
        .post(
            "/users/forgot-password",
            &ForgotPasswordRequest {
                email: signup.email,
            },
        )
        .await
        .unwrap();
    assert_status(again, StatusCode::CONFLICT).await.unwrap();
}

#[tokio::test]
async fn test_update_password_unknown_token() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .patch(
            "/users/update-password?token=does-not-exist",
            &UpdatePasswordRequest {
                new_password: "BrandNew456".to_string(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();

    let response = server
        .patch(
            "/users/update-password",
            &UpdatePasswordRequest {
                new_password: "BrandNew456".to_string(),
            },
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

// ============================================================================
// Rate Limit Tests
// ============================================================================

#[tokio::test]
async fn test_rate_limit_per_client() {
    let server = TestServer::start().await.expect("Failed to start server");

    for _ in 0..10 {
        let response = server.get("/users/me").await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = server.get("/users/me").await.unwrap();
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let error: ErrorResponse = assert_json(response, StatusCode::TOO_MANY_REQUESTS)
        .await
        .unwrap();
    assert_eq!(error.error.message, "request denied, too many requests");

    // Health probes are not rate limited
    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_graceful_shutdown() {
    let server = TestServer::start().await.expect("Failed to start server");
    let addr = server.addr;

    let response = server.get("/health").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    server.stop().await.unwrap();

    let result = reqwest::get(format!("http://{addr}/health")).await;
    assert!(result.is_err());
}

// ============================================================================
// PostgreSQL Tests
// ============================================================================

#[tokio::test]
async fn postgres_session_lifecycle() {
    if !check_test_env() {
        return;
    }

    let server = TestServer::start_postgres()
        .await
        .expect("Failed to start server");

    let response = server.get("/health/ready").await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let (signup, access, refresh) = signed_in(&server).await;

    let response = server.get_auth("/users/me", &access).await.unwrap();
    let me: CurrentUserResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(me.username, signup.username);

    let response = server.refresh(&refresh).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.refresh(&refresh).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn postgres_signup_duplicate_username() {
    if !check_test_env() {
        return;
    }

    let server = TestServer::start_postgres()
        .await
        .expect("Failed to start server");
    let first = SignupRequest::unique();
    server.post("/users/signup", &first).await.unwrap();

    let mut second = SignupRequest::unique();
    second.username = first.username.clone();

    let response = server.post("/users/signup", &second).await.unwrap();
    assert_status(response, StatusCode::CONFLICT).await.unwrap();
}

#[tokio::test]
async fn postgres_forgot_password_single_active_link() {
    if !check_test_env() {
        return;
    }

    let server = TestServer::start_postgres()
        .await
        .expect("Failed to start server");
    let (signup, _, _) = signed_in(&server).await;
    let request = ForgotPasswordRequest {
        email: signup.email,
    };

    let response = server.post("/users/forgot-password", &request).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.post("/users/forgot-password", &request).await.unwrap();
    assert_status(response, StatusCode::CONFLICT).await.unwrap();
}
