//! FTP Transfer modes
//!
//! Transfer types, the pending data-connection mode, and the host-port
//! encoding shared by PASV replies and PORT arguments.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::TcpListener;

use crate::error::NetworkError;

/// Representation type selected with TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferType {
    #[default]
    Ascii,
    Binary,
}

impl TransferType {
    /// Parses a TYPE argument. `None` means the type is not supported.
    pub fn parse(arg: &str) -> Option<Self> {
        let upper = arg.trim().to_ascii_uppercase();
        let mut parts = upper.split_whitespace();
        let kind = parts.next()?;
        let param = parts.next();
        if parts.next().is_some() {
            return None;
        }
        match (kind, param) {
            ("A", None | Some("N")) => Some(TransferType::Ascii),
            ("I", None) | ("L", Some("8")) => Some(TransferType::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::Ascii => f.write_str("ASCII"),
            TransferType::Binary => f.write_str("Binary"),
        }
    }
}

/// Data connection requested by PASV or PORT and not yet used.
#[derive(Debug, Default)]
pub enum DataMode {
    #[default]
    None,
    /// Server listens; the client connects.
    Passive(TcpListener),
    /// Client listens at this address; the server connects.
    Active(SocketAddr),
}

impl DataMode {
    pub fn is_none(&self) -> bool {
        matches!(self, DataMode::None)
    }
}

/// Encodes an address as `h1,h2,h3,h4,p1,p2`.
pub fn encode_host_port(addr: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port >> 8, port & 0xff)
}

/// Decodes a PORT argument `h1,h2,h3,h4,p1,p2`.
pub fn parse_host_port(arg: &str) -> Result<SocketAddrV4, NetworkError> {
    let invalid = || NetworkError::InvalidPortArgument(arg.to_string());

    let fields: Vec<u8> = arg
        .trim()
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    let [h1, h2, h3, h4, p1, p2] = fields[..] else {
        return Err(invalid());
    };
    let port = (u16::from(p1) << 8) | u16::from(p2);
    Ok(SocketAddrV4::new(Ipv4Addr::new(h1, h2, h3, h4), port))
}
