//! # session-service
//!
//! Application layer: session issuance and rotation, request authentication,
//! the password reset flow, outbound mail dispatch, and DTOs.

pub mod dto;
pub mod mail;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dto::{
    CurrentUserResponse, ForgotPasswordRequest, HealthChecks, HealthResponse, LoginRequest,
    MessageResponse, ReadinessResponse, ResetTokenQuery, SignupRequest, SignupResponse,
    TokenResponse, UpdatePasswordRequest,
};
pub use mail::{DispatchStats, LogMailer, MailDispatcher, MailError, MailMessage, Mailer};
pub use services::{
    AuthGate, AuthenticatedUser, IssuedSession, PasswordResetFlow, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult, SessionManager,
};
