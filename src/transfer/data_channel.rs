//! Module `data_channel`
//!
//! Opens the per-transfer data connections: a listener for passive mode, an
//! outbound connect for active mode. Each data connection carries exactly one
//! transfer and is closed afterwards.

use log::{debug, info, warn};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::config::ServerConfig;
use crate::error::NetworkError;
use crate::transfer::modes::DataMode;

/// Lowest port a PORT command may ask the server to connect to.
const MIN_ACTIVE_PORT: u16 = 1024;

/// Read-only after construction; shared by all sessions.
#[derive(Debug, Clone)]
pub struct DataChannelManager {
    bind_ip: IpAddr,
    passive_address: Option<Ipv4Addr>,
    port_range: Option<(u16, u16)>,
    connect_timeout: Duration,
}

impl DataChannelManager {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            bind_ip: config.bind_ip(),
            passive_address: config.passive_address,
            port_range: config.passive_port_range(),
            connect_timeout: config.data_timeout(),
        }
    }

    /// Binds a passive listener under the same interface policy as the
    /// control listener and returns it with the address to advertise.
    ///
    /// The advertised host is the configured passive address, else the local
    /// address the client reached the control connection on.
    pub async fn open_passive(
        &self,
        control_local: SocketAddr,
    ) -> Result<(TcpListener, SocketAddrV4), NetworkError> {
        let listener = self.bind_passive().await?;
        let port = listener
            .local_addr()
            .map_err(NetworkError::DataConnectionFailed)?
            .port();

        let host = self
            .passive_address
            .or_else(|| ipv4_of(control_local.ip()).filter(|ip| !ip.is_unspecified()))
            .unwrap_or(Ipv4Addr::LOCALHOST);

        let advertised = SocketAddrV4::new(host, port);
        debug!("Passive listener bound on port {port}, advertising {advertised}");
        Ok((listener, advertised))
    }

    async fn bind_passive(&self) -> Result<TcpListener, NetworkError> {
        let Some((min, max)) = self.port_range else {
            let addr = SocketAddr::new(self.bind_ip, 0);
            return TcpListener::bind(addr)
                .await
                .map_err(|source| NetworkError::Bind { addr, source });
        };

        let mut last_error = None;
        for port in min..=max {
            let addr = SocketAddr::new(self.bind_ip, port);
            match TcpListener::bind(addr).await {
                Ok(listener) => return Ok(listener),
                Err(source) => last_error = Some(NetworkError::Bind { addr, source }),
            }
        }
        Err(last_error.unwrap_or_else(|| NetworkError::Bind {
            addr: SocketAddr::new(self.bind_ip, min),
            source: io::Error::new(io::ErrorKind::AddrInUse, "passive port range exhausted"),
        }))
    }

    /// Validates a PORT target: same host as the control peer, unprivileged port.
    pub fn check_active_target(
        &self,
        peer: SocketAddr,
        requested: SocketAddrV4,
    ) -> Result<SocketAddr, NetworkError> {
        let provided = IpAddr::V4(*requested.ip());
        let expected = canonical_ip(peer.ip());
        if provided != expected {
            return Err(NetworkError::ForeignAddress { expected, provided });
        }
        if requested.port() < MIN_ACTIVE_PORT {
            return Err(NetworkError::PrivilegedPort(requested.port()));
        }
        Ok(SocketAddr::V4(requested))
    }

    /// Connects to the client's listening socket (active mode).
    pub async fn open_active(&self, remote: SocketAddr) -> Result<TcpStream, NetworkError> {
        match timeout(self.connect_timeout, TcpStream::connect(remote)).await {
            Ok(Ok(stream)) => {
                info!("Active data connection established to {remote}");
                Ok(stream)
            }
            Ok(Err(e)) => Err(NetworkError::DataConnectionFailed(e)),
            Err(_) => Err(NetworkError::DataConnectionTimeout),
        }
    }

    /// Waits for the client to connect to a passive listener.
    ///
    /// Connections from any host other than the control peer are dropped and
    /// waiting continues until the data timeout.
    pub async fn accept_passive(
        &self,
        listener: TcpListener,
        peer_ip: IpAddr,
    ) -> Result<TcpStream, NetworkError> {
        let expected = canonical_ip(peer_ip);
        let accept = async {
            loop {
                let (stream, addr) = listener.accept().await?;
                if canonical_ip(addr.ip()) == expected {
                    info!("Passive data connection accepted from {addr}");
                    return Ok::<_, io::Error>(stream);
                }
                warn!("Rejected passive data connection from foreign address {addr}");
            }
        };
        match timeout(self.connect_timeout, accept).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(NetworkError::DataConnectionFailed(e)),
            Err(_) => Err(NetworkError::DataConnectionTimeout),
        }
    }

    /// Turns a pending data mode into a connected stream.
    pub async fn establish(&self, mode: DataMode, peer: SocketAddr) -> Result<TcpStream, NetworkError> {
        match mode {
            DataMode::None => Err(NetworkError::NoDataConnection),
            DataMode::Passive(listener) => self.accept_passive(listener, peer.ip()).await,
            DataMode::Active(remote) => self.open_active(remote).await,
        }
    }
}

fn ipv4_of(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    ipv4_of(ip).map(IpAddr::V4).unwrap_or(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn manager() -> DataChannelManager {
        let config = ServerConfig::new("/srv", "bob", "pw").with_data_timeout(Duration::from_secs(2));
        DataChannelManager::new(&config)
    }

    #[tokio::test]
    async fn passive_listener_advertises_control_address() {
        let control_local: SocketAddr = "127.0.0.1:2121".parse().unwrap();
        let (listener, advertised) = manager().open_passive(control_local).await.unwrap();
        assert_eq!(*advertised.ip(), Ipv4Addr::LOCALHOST);
        assert_eq!(advertised.port(), listener.local_addr().unwrap().port());
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn passive_address_override_is_advertised() {
        let config = ServerConfig::new("/srv", "bob", "pw")
            .with_passive_address(Ipv4Addr::new(203, 0, 113, 7));
        let (_listener, advertised) = DataChannelManager::new(&config)
            .open_passive("127.0.0.1:2121".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(*advertised.ip(), Ipv4Addr::new(203, 0, 113, 7));
    }

    #[tokio::test]
    async fn passive_accept_then_exchange_bytes() {
        let mgr = manager();
        let (listener, advertised) = mgr.open_passive("127.0.0.1:2121".parse().unwrap()).await.unwrap();
        let client = tokio::spawn(async move {
            let mut s = TcpStream::connect(SocketAddr::V4(advertised)).await.unwrap();
            s.write_all(b"ping").await.unwrap();
        });
        let mut stream = mgr
            .establish(DataMode::Passive(listener), "127.0.0.1:40000".parse().unwrap())
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"ping");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn passive_accept_times_out_without_client() {
        let config = ServerConfig::new("/srv", "bob", "pw").with_data_timeout(Duration::from_secs(1));
        let mgr = DataChannelManager::new(&config);
        let (listener, _) = mgr.open_passive("127.0.0.1:2121".parse().unwrap()).await.unwrap();
        let err = mgr
            .accept_passive(listener, "127.0.0.1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::DataConnectionTimeout));
    }

    #[tokio::test]
    async fn no_pending_mode_is_an_error() {
        let err = manager()
            .establish(DataMode::None, "127.0.0.1:40000".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::NoDataConnection));
    }

    #[test]
    fn active_target_must_match_peer_and_be_unprivileged() {
        let mgr = manager();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        assert!(mgr
            .check_active_target(peer, "127.0.0.1:5000".parse().unwrap())
            .is_ok());
        assert!(matches!(
            mgr.check_active_target(peer, "10.0.0.9:5000".parse().unwrap()),
            Err(NetworkError::ForeignAddress { .. })
        ));
        assert!(matches!(
            mgr.check_active_target(peer, "127.0.0.1:21".parse().unwrap()),
            Err(NetworkError::PrivilegedPort(21))
        ));
    }

    #[tokio::test]
    async fn active_connect_reaches_client_listener() {
        let client = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = client.local_addr().unwrap();
        let accept = tokio::spawn(async move { client.accept().await.unwrap().0 });
        let stream = manager().establish(DataMode::Active(addr), addr).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
        accept.await.unwrap();
    }
}
