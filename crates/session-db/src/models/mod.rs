//! Database models - SQLx-compatible structs for PostgreSQL tables

mod password_reset;
mod refresh_token;
mod user;

pub use password_reset::PasswordResetTokenModel;
pub use refresh_token::RefreshTokenModel;
pub use user::UserModel;
