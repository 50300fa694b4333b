//! Authentication utilities

mod jwt;
mod password;
mod token;

pub use jwt::{
    checked_lifetime, Claims, TokenIssuer, TokenPair, TokenSubject, TokenType, MAX_LIFETIME_SECS,
};
pub use password::{
    hash_password, validate_password_strength, verify_dummy, verify_password, MAX_PASSWORD_LEN,
    MIN_PASSWORD_LEN,
};
pub use token::{generate_opaque_token, OPAQUE_TOKEN_LEN};
