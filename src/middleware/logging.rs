//! Logging middleware
//!
//! The human-readable event stream handed to the embedding application
//! (a window's log pane, a terminal, a test). Emitting never waits on the
//! consumer.

use chrono::{DateTime, Local};
use log::info;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One timestamped, human-readable event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.message)
    }
}

/// Receiver of server events. Implementations must not block.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: LogEntry);
}

/// Forwards entries over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, entry: LogEntry) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(entry);
    }
}

/// Forwards entries to the `log` facade.
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn emit(&self, entry: LogEntry) {
        info!(target: "lanshare_ftp::events", "{}", entry.message);
    }
}

/// Discards everything.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _entry: LogEntry) {}
}

/// Typed front-end over a [`LogSink`]: one method per event kind, so message
/// wording lives in one place and passwords never reach the sink.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<dyn LogSink>,
}

impl EventLog {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, message: impl Into<String>) {
        self.sink.emit(LogEntry::now(message));
    }

    pub fn server_started(&self, addr: SocketAddr, root: &std::path::Path) {
        self.emit(format!(
            "FTP server started on {} sharing {}",
            addr,
            root.display()
        ));
    }

    pub fn server_stopped(&self) {
        self.emit("FTP server stopped");
    }

    pub fn already_running(&self) {
        self.emit("Server is already running");
    }

    pub fn not_running(&self) {
        self.emit("Server is not running");
    }

    pub fn connection_accepted(&self, peer: SocketAddr) {
        self.emit(format!("Client connected: {peer}"));
    }

    pub fn command(&self, peer: SocketAddr, loggable: &str) {
        self.emit(format!("{peer} > {loggable}"));
    }

    pub fn login_succeeded(&self, peer: SocketAddr, username: &str) {
        self.emit(format!("{peer} logged in as \"{username}\""));
    }

    pub fn login_failed(&self, peer: SocketAddr, username: &str) {
        self.emit(format!("{peer} failed login as \"{username}\""));
    }

    pub fn too_many_logins(&self, peer: SocketAddr) {
        self.emit(format!(
            "{peer} disconnected after too many failed login attempts"
        ));
    }

    pub fn transfer_completed(&self, peer: SocketAddr, kind: &str, path: &str, bytes: u64) {
        self.emit(format!("{peer} {kind} completed: {path} ({bytes} bytes)"));
    }

    pub fn transfer_failed(&self, peer: SocketAddr, kind: &str, path: &str, reason: &str) {
        self.emit(format!("{peer} {kind} failed: {path} ({reason})"));
    }

    pub fn transfer_aborted(&self, peer: SocketAddr, kind: &str, path: &str) {
        self.emit(format!(
            "{peer} {kind} aborted: {path} (server shutting down)"
        ));
    }

    pub fn command_failed(&self, peer: SocketAddr, verb: &str, reason: &str) {
        self.emit(format!("{peer} {verb} failed: {reason}"));
    }

    pub fn idle_timeout(&self, peer: SocketAddr) {
        self.emit(format!("{peer} closed after idle timeout"));
    }

    pub fn disconnected(&self, peer: SocketAddr) {
        self.emit(format!("Client disconnected: {peer}"));
    }

    pub fn fatal(&self, context: &str, err: &dyn fmt::Display) {
        self.emit(format!("Error: {context}: {err}"));
    }
}
