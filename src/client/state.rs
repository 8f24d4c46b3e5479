//! Module `client`
//!
//! Defines the `Session` struct holding everything one control connection
//! remembers between commands: login progress, working directory, transfer
//! type, the pending data connection and a pending rename source.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::Credential;
use crate::storage::ResolvedPath;
use crate::transfer::modes::{DataMode, TransferType};

/// Login progress of a session.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    AwaitingPassword {
        username: String,
    },
    Authenticated {
        credential: Arc<Credential>,
    },
}

/// Per-connection state. Owned by exactly one session task.
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    local: SocketAddr,
    auth: AuthState,
    current_virtual_dir: String,
    transfer_type: TransferType,
    pending_data_mode: DataMode,
    rename_from: Option<ResolvedPath>,
    failed_logins: u32,
}

impl Session {
    pub fn new(peer: SocketAddr, local: SocketAddr) -> Self {
        Self {
            peer,
            local,
            auth: AuthState::Unauthenticated,
            current_virtual_dir: "/".to_string(),
            transfer_type: TransferType::default(),
            pending_data_mode: DataMode::None,
            rename_from: None,
            failed_logins: 0,
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    /// Address of the client end of the control connection.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Address the client reached us on; PASV advertises its IP.
    pub fn local(&self) -> SocketAddr {
        self.local
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    /// Credential of the logged-in user, if any.
    pub fn credential(&self) -> Option<&Arc<Credential>> {
        match &self.auth {
            AuthState::Authenticated { credential } => Some(credential),
            _ => None,
        }
    }

    /// Username waiting for PASS, if any.
    pub fn pending_username(&self) -> Option<&str> {
        match &self.auth {
            AuthState::AwaitingPassword { username } => Some(username),
            _ => None,
        }
    }

    pub fn current_virtual_dir(&self) -> &str {
        &self.current_virtual_dir
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn has_pending_data_mode(&self) -> bool {
        !self.pending_data_mode.is_none()
    }

    pub fn failed_logins(&self) -> u32 {
        self.failed_logins
    }

    // --------------------
    // Setter methods
    // --------------------

    /// Remembers the username from USER and waits for PASS.
    pub fn begin_login(&mut self, username: String) {
        self.auth = AuthState::AwaitingPassword { username };
    }

    /// Completes a login after PASS succeeded.
    pub fn login(&mut self, credential: Arc<Credential>) {
        self.auth = AuthState::Authenticated { credential };
        self.failed_logins = 0;
    }

    /// Records a failed PASS and returns to Unauthenticated.
    ///
    /// Returns the number of consecutive failures so far.
    pub fn login_failed(&mut self) -> u32 {
        self.auth = AuthState::Unauthenticated;
        self.failed_logins += 1;
        self.failed_logins
    }

    pub fn set_current_virtual_dir(&mut self, path: String) {
        self.current_virtual_dir = path;
    }

    pub fn set_transfer_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    /// Replaces the pending data mode. A previous passive listener is dropped (closed).
    pub fn set_pending_data_mode(&mut self, mode: DataMode) {
        self.pending_data_mode = mode;
    }

    /// Takes the pending data mode, leaving `DataMode::None` behind.
    pub fn take_pending_data_mode(&mut self) -> DataMode {
        std::mem::take(&mut self.pending_data_mode)
    }

    pub fn set_rename_from(&mut self, from: ResolvedPath) {
        self.rename_from = Some(from);
    }

    pub fn take_rename_from(&mut self) -> Option<ResolvedPath> {
        self.rename_from.take()
    }
}
