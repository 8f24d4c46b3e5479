//! Server core functionality
//!
//! This module contains the lifecycle controller and listener, the state
//! shared by sessions, and the registry of live sessions.

pub mod context;
pub mod core;
pub mod registry;

pub use context::ServerContext;
pub use core::FtpServer;
pub use registry::SessionRegistry;
