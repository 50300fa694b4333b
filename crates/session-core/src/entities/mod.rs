//! Domain entities - core business objects

mod password_reset;
mod refresh_token;
mod user;

pub use password_reset::PasswordResetToken;
pub use refresh_token::RefreshTokenRecord;
pub use user::{Credentials, NewUser, User};
