//! Session handlers
//!
//! Endpoints for signup, login and refresh-token rotation. The access token is
//! returned in the body; the refresh token only ever travels in an HttpOnly
//! cookie.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use session_common::AppError;
use session_service::{
    IssuedSession, LoginRequest, SessionManager, SignupRequest, SignupResponse, TokenResponse,
};

use crate::extractors::ValidatedJson;
use crate::response::{ApiError, ApiResult, Created};
use crate::state::AppState;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Path the refresh cookie is scoped to
pub const REFRESH_COOKIE_PATH: &str = "/users";

/// Register a new user
///
/// POST /users/signup
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> ApiResult<Created<Json<SignupResponse>>> {
    let manager = SessionManager::new(state.service_context());
    let user = manager.signup(request).await?;
    Ok(Created(Json(SignupResponse::from(&user))))
}

/// Login with username and password
///
/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let manager = SessionManager::new(state.service_context());
    let session = manager.login(request).await?;
    Ok(session_response(&state, jar, &session))
}

/// Rotate the refresh token from the cookie
///
/// POST /users/refresh
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::App(AppError::MissingAuth))?;

    let manager = SessionManager::new(state.service_context());
    let session = manager.refresh(&presented).await?;
    Ok(session_response(&state, jar, &session))
}

fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: &IssuedSession,
) -> (CookieJar, Json<TokenResponse>) {
    let max_age = state.service_context().token_issuer().refresh_ttl();
    let cookie = Cookie::build((REFRESH_COOKIE, session.tokens.refresh_token.clone()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .secure(state.config().app.env.is_production())
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build();

    (jar.add(cookie), Json(TokenResponse::from(session)))
}
