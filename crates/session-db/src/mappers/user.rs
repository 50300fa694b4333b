//! User entity <-> model mapper

use session_core::entities::{Credentials, User};
use session_core::value_objects::UserId;

use crate::models::UserModel;

/// Convert UserModel to User entity (drops the password hash)
impl From<UserModel> for User {
    fn from(model: UserModel) -> Self {
        User {
            id: UserId::new(model.id),
            username: model.username,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

/// Convert UserModel to Credentials (keeps the password hash)
impl From<UserModel> for Credentials {
    fn from(mut model: UserModel) -> Self {
        let password_hash = std::mem::take(&mut model.password_hash);
        Credentials {
            user: User::from(model),
            password_hash,
        }
    }
}
