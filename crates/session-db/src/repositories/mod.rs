//! Repository implementations for PostgreSQL

mod error;
mod health;
mod password_reset;
mod refresh_token;
mod user;

pub use error::{map_db_error, map_unique_violation, user_conflict};
pub use health::PgStoreHealth;
pub use password_reset::{PgPasswordResetRepository, PgResetTransaction};
pub use refresh_token::PgRefreshTokenRepository;
pub use user::PgUserRepository;
