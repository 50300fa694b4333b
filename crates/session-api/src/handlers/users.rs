//! User handlers

use axum::Json;
use session_service::CurrentUserResponse;

use crate::extractors::AuthUser;

/// Get the identity behind the bearer token
///
/// GET /users/me
pub async fn get_current_user(AuthUser(user): AuthUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse::from(user))
}
