//! Transfer module for FTP server
//!
//! Handles data channel management, transfer types and the byte streams
//! moved over each data connection.

pub mod data_channel;
pub mod file_ops;
pub mod modes;

pub use data_channel::DataChannelManager;
pub use file_ops::{receive_file, send_bytes, send_file};
pub use modes::{DataMode, TransferType, encode_host_port, parse_host_port};
