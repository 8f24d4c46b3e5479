//! File system storage management
//!
//! Handles path validation and the filesystem side of FTP commands.

pub mod operations;
pub mod validation;

pub use validation::{PathResolver, ResolvedPath, normalize_virtual};
