//! Opaque random tokens (password reset links)

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Length of a generated reset token (62^48, roughly 285 bits of entropy)
pub const OPAQUE_TOKEN_LEN: usize = 48;

/// Generate a URL-safe random token from the operating system RNG
#[must_use]
pub fn generate_opaque_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}
