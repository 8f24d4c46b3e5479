//! Network utilities
//!
//! Provides network-related utility functions.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Discovers the address of the interface used for outbound traffic.
///
/// Connecting a UDP socket only selects a route; no packet is sent, so this
/// works without internet access as long as a default route exists.
pub fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() { None } else { Some(ip) }
}
