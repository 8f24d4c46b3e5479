//! Authentication system
//!
//! Holds the configured account, validates credentials and exposes the
//! permission set each command is checked against.

pub mod credentials;
pub mod validator;

pub use credentials::{Credential, Permission};
pub use validator::Authorizer;
