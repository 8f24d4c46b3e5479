use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::{NetworkError, ServerError};
use crate::middleware::{EventLog, LogSink};
use crate::server::ServerContext;
use crate::server::registry::SessionRegistry;

/// How long aborted sessions get to unwind after the grace period.
const ABORT_WAIT: Duration = Duration::from_secs(1);

/// Back-off after a failed `accept` so persistent errors do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// FTP server lifecycle controller.
///
/// One instance can be started and stopped repeatedly; each `start` takes a
/// fresh [`ServerConfig`] that stays fixed until the matching `stop`.
pub struct FtpServer {
    events: EventLog,
    running: Mutex<Option<RunningServer>>,
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    sessions: Arc<SessionRegistry>,
    grace: Duration,
}

impl FtpServer {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            events: EventLog::new(sink),
            running: Mutex::new(None),
        }
    }

    /// Validates `config`, binds the control listener and starts accepting.
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn start(&self, config: ServerConfig) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Start requested while already running");
            self.events.already_running();
            return Err(ServerError::AlreadyRunning);
        }

        let server = self.launch(config).await.inspect_err(|e| {
            error!("Server startup failed: {e}");
            self.events.fatal("Server startup failed", e);
        })?;
        let local_addr = server.local_addr;
        *running = Some(server);
        Ok(local_addr)
    }

    async fn launch(&self, config: ServerConfig) -> Result<RunningServer, ServerError> {
        let root = config.validate()?;
        let bind_addr = config.bind_addr();

        let listener = TcpListener::bind(bind_addr).await.map_err(|source| {
            if source.kind() == io::ErrorKind::AddrInUse {
                NetworkError::PortInUse(bind_addr)
            } else {
                NetworkError::Bind {
                    addr: bind_addr,
                    source,
                }
            }
        })?;
        let local_addr = listener.local_addr().map_err(|source| NetworkError::Bind {
            addr: bind_addr,
            source,
        })?;
        info!("Server bound to {local_addr}");

        let shutdown = CancellationToken::new();
        let grace = config.shutdown_grace();
        let ctx = Arc::new(ServerContext::new(
            config,
            root.clone(),
            self.events.clone(),
            shutdown.clone(),
        ));
        let sessions = Arc::new(SessionRegistry::new());
        let accept_task = tokio::spawn(accept_loop(listener, ctx, Arc::clone(&sessions)));

        self.events.server_started(local_addr, &root);
        Ok(RunningServer {
            local_addr,
            shutdown,
            accept_task,
            sessions,
            grace,
        })
    }

    /// Closes the listener and every session.
    ///
    /// Sessions get the configured grace period to notice the shutdown and
    /// close their sockets; whatever is left afterwards is aborted.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            warn!("Stop requested while not running");
            self.events.not_running();
            return Err(ServerError::NotRunning);
        };

        info!(
            "Stopping server on {} ({} active sessions)",
            server.local_addr,
            server.sessions.len()
        );
        server.shutdown.cancel();

        if let Err(e) = server.accept_task.await {
            error!("Accept loop ended abnormally: {e}");
            self.events.fatal("Accept loop ended abnormally", &e);
        }

        if !server.sessions.wait_empty(server.grace).await {
            let aborted = server.sessions.abort_all().await;
            warn!(
                "Aborted {aborted} sessions still running after {}s",
                server.grace.as_secs()
            );
            server.sessions.wait_empty(ABORT_WAIT).await;
        }

        self.events.server_stopped();
        info!("Server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.local_addr)
    }

    pub async fn session_count(&self) -> usize {
        self.running
            .lock()
            .await
            .as_ref()
            .map_or(0, |s| s.sessions.len())
    }
}

impl Drop for FtpServer {
    fn drop(&mut self) {
        // Dropped without stop(): still tell sessions to go away.
        if let Some(server) = self.running.get_mut().as_ref() {
            server.shutdown.cancel();
        }
    }
}

async fn accept_loop(listener: TcpListener, ctx: Arc<ServerContext>, sessions: Arc<SessionRegistry>) {
    loop {
        let accepted = tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                info!("Accepted connection from {peer}");
                ctx.events.connection_accepted(peer);
                spawn_session(stream, peer, &ctx, &sessions).await;
            }
            Err(e) => {
                error!("Error accepting connection: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
    info!("Listener closed");
}

/// Spawns the session task plus a small supervisor that reports panics and
/// deregisters the session when it ends.
async fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &Arc<ServerContext>,
    sessions: &Arc<SessionRegistry>,
) {
    let task = tokio::spawn(handle_client(stream, peer, Arc::clone(ctx)));
    sessions.insert(peer, task.abort_handle()).await;

    let sessions = Arc::clone(sessions);
    let events = ctx.events.clone();
    tokio::spawn(async move {
        match task.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                error!("Session {peer} panicked: {e}");
                events.fatal(&format!("Session {peer} crashed"), &e);
            }
            Err(_) => {
                warn!("Session {peer} aborted");
                events.disconnected(peer);
            }
        }
        sessions.remove(&peer).await;
    });
}
