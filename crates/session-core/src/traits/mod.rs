//! Store traits (ports) implemented by the infrastructure layer

mod repositories;

pub use repositories::{
    PasswordResetRepository, RefreshTokenRepository, RepoResult, ResetTransaction,
    StoreHealth, UserRepository,
};
