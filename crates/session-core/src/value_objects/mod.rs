//! Value objects - immutable types that represent domain concepts

mod token_hash;
mod user_id;

pub use token_hash::TokenHash;
pub use user_id::{UserId, UserIdParseError};
