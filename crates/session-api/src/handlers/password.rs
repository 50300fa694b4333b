//! Password reset handlers
//!
//! POST /users/forgot-password answers the same way whether or not the
//! email belongs to an account.

use axum::{
    extract::{Query, State},
    Json,
};
use session_service::{
    ForgotPasswordRequest, MessageResponse, PasswordResetFlow, ResetTokenQuery,
    UpdatePasswordRequest,
};
use tracing::info;

use crate::extractors::ValidatedJson;
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

/// Reply to every accepted forgot-password request
pub const RESET_MAIL_SENT_MESSAGE: &str =
    "A mail has been sent with the reset password link to your registered Email. Kindly check.";

/// Reply after a successful password update
pub const PASSWORD_UPDATED_MESSAGE: &str = "Password updated successfully";

/// Start a password reset
///
/// POST /users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let flow = PasswordResetFlow::new(state.service_context());
    match flow.request_reset(&request.email).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            info!("Password reset requested for unknown email");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(MessageResponse::new(RESET_MAIL_SENT_MESSAGE)))
}

/// Complete a password reset with the token from the mailed link
///
/// PATCH /users/update-password?token=...
pub async fn update_password(
    State(state): State<AppState>,
    Query(query): Query<ResetTokenQuery>,
    ValidatedJson(request): ValidatedJson<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = query
        .token()
        .ok_or_else(|| ApiError::invalid_query("token is required"))?;

    let flow = PasswordResetFlow::new(state.service_context());
    flow.complete_reset(token, &request.new_password).await?;
    Ok(Json(MessageResponse::new(PASSWORD_UPDATED_MESSAGE)))
}
