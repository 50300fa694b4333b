//! Entity to model mappers
//!
//! Conversions between domain entities (session-core) and database models.
//! - `From<Model> for Entity`: Convert database rows to domain objects
//! - `*Insert` structs: Prepare entity data for database operations

mod password_reset;
mod refresh_token;
mod user;

pub use password_reset::ResetTokenInsert;
pub use refresh_token::RefreshTokenInsert;
