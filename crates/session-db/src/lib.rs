//! # session-db
//!
//! Database layer implementing the credential-store traits with PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! This crate provides PostgreSQL implementations for the repository traits
//! defined in `session-core`. It handles:
//!
//! - Connection pool management and migrations
//! - Database models with SQLx `FromRow` derives
//! - Entity <-> Model mappers
//! - Repository implementations, including the transactional refresh-token
//!   rotation and the row-locked password-reset claim
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_db::pool::{create_pool, DatabaseConfig};
//! use session_db::repositories::PgUserRepository;
//! use session_core::traits::UserRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::default()).await?;
//!     let user_repo = PgUserRepository::new(pool);
//!
//!     let alice = user_repo.find_by_username("alice").await?;
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, ping, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    PgPasswordResetRepository, PgRefreshTokenRepository, PgResetTransaction, PgStoreHealth,
    PgUserRepository,
};
