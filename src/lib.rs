//! lanshare-ftp
//!
//! A minimal FTP server that shares one local folder, either on loopback
//! only or on every interface, behind a single username and password.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use config::ServerConfig;
pub use error::{ConfigError, NetworkError, ServerError};
pub use middleware::{ChannelSink, LogCrateSink, LogEntry, LogSink, NullSink};
pub use server::FtpServer;
