//! Client management system
//!
//! Per-connection session state and the control-channel loop that drives it.

pub mod handler;
pub mod state;

pub use handler::handle_client;
pub use state::{AuthState, Session};
