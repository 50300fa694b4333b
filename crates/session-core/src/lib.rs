//! # session-core
//!
//! Domain layer for the session/security core: user identities, refresh-token and
//! password-reset records, and the credential-store traits the other layers implement.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Credentials, NewUser, PasswordResetToken, RefreshTokenRecord, User};
pub use error::DomainError;
pub use traits::{
    PasswordResetRepository, RefreshTokenRepository, RepoResult, ResetTransaction,
    StoreHealth, UserRepository,
};
pub use value_objects::{TokenHash, UserId, UserIdParseError};
