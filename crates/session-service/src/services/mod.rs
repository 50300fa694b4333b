//! Business logic services
//!
//! Session issuance and rotation, request authentication and the password
//! reset flow, all orchestrated over the credential store ports.

pub mod context;
pub mod error;
pub mod gate;
pub mod password_reset;
pub mod session;

pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use gate::{AuthGate, AuthenticatedUser};
pub use password_reset::{PasswordResetFlow, ACTIVE_LINK_MESSAGE, UNKNOWN_TOKEN_MESSAGE};
pub use session::{IssuedSession, SessionManager};
