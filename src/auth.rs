//! Tenant identifiers, redacted token secrets, and session credential models.

pub mod id;
pub mod secret;
pub mod session;

pub use id::*;
pub use secret::*;
pub use session::*;
