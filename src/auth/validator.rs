//! Authentication validator
//!
//! Implements FTP user authentication against the configured credentials.
//! Only one account is populated today, but lookups go through a list so more
//! accounts need no interface change.

use std::sync::Arc;

use super::credentials::{Credential, Permission};
use crate::config::ServerConfig;
use crate::error::AuthError;

/// Read-only after construction; shared by all sessions without locking.
#[derive(Debug, Clone)]
pub struct Authorizer {
    credentials: Vec<Arc<Credential>>,
}

impl Authorizer {
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self {
            credentials: credentials.into_iter().map(Arc::new).collect(),
        }
    }

    /// Builds the single-account authorizer described by `config`.
    ///
    /// `root` is the canonical root directory checked at server start.
    pub fn from_config(config: &ServerConfig, root: std::path::PathBuf) -> Self {
        let permissions: Vec<Permission> = config.permissions.clone();
        Self::new([Credential::new(
            config.username.clone(),
            config.password.clone(),
            root,
            permissions,
        )])
    }

    /// Validates a username/password pair.
    ///
    /// Comparison is exact and case-sensitive. Every configured account is
    /// checked in constant time so response timing does not reveal which part
    /// of the pair was wrong.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Arc<Credential>, AuthError> {
        let mut found = None;
        for credential in &self.credentials {
            let user_ok = constant_time_eq(credential.username().as_bytes(), username.as_bytes());
            let pass_ok = constant_time_eq(credential.password().as_bytes(), password.as_bytes());
            if user_ok & pass_ok && found.is_none() {
                found = Some(Arc::clone(credential));
            }
        }
        found.ok_or(AuthError::InvalidCredentials)
    }
}

/// Compares two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = (a.len() ^ b.len()) as u64;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= u64::from(x ^ y);
    }
    diff == 0
}
