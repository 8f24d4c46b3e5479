//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use crate::auth::Permission;

/// Configuration errors. Fatal to server start; the server stays stopped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("root directory does not exist or is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("invalid passive port range {min}-{max}")]
    InvalidPassiveRange { min: u16, max: u16 },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not logged in")]
    NotLoggedIn,
}

/// Virtual path resolution errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("path escapes the shared root: {0}")]
    Escape(String),

    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("operation not permitted on the root directory")]
    RootEntry,

    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: io::Error },
}

/// Raised when the session's credential lacks the permission an action needs.
#[derive(Debug, Error)]
#[error("permission denied: {0} not granted")]
pub struct PermissionError(pub Permission);

/// Control listener and data channel errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("address already in use: {0}")]
    PortInUse(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("no data connection requested (use PASV or PORT first)")]
    NoDataConnection,

    #[error("timed out waiting for data connection")]
    DataConnectionTimeout,

    #[error("data connection failed: {0}")]
    DataConnectionFailed(#[source] io::Error),

    #[error("invalid PORT argument: {0}")]
    InvalidPortArgument(String),

    #[error("rejected data connection to foreign address {provided} (control peer is {expected})")]
    ForeignAddress { expected: IpAddr, provided: IpAddr },

    #[error("PORT to privileged port {0} rejected")]
    PrivilegedPort(u16),
}

/// Errors raised while streaming bytes over an established data connection.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("data connection error: {0}")]
    Network(#[source] io::Error),

    #[error("local file error: {0}")]
    LocalIo(#[source] io::Error),

    #[error("transfer aborted: server shutting down")]
    Aborted,
}

/// Lifecycle errors returned by [`crate::server::FtpServer`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server is not running")]
    NotRunning,
}

/// Recoverable failure of a single FTP command.
///
/// Every variant maps to exactly one reply (see [`crate::error::reply_for`]);
/// the session stays open afterwards.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("file operation failed on {path}: {source}")]
    FileSystem { path: String, source: io::Error },
}
