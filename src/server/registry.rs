//! Session registry
//!
//! Tracks live session tasks by peer address so shutdown can wait for them
//! and abort the stragglers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::AbortHandle;
use tokio::time::timeout;

/// Registry for tracking active sessions
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SocketAddr, AbortHandle>>,
    count: watch::Sender<usize>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            count: watch::Sender::new(0),
        }
    }

    pub async fn insert(&self, peer: SocketAddr, handle: AbortHandle) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(peer, handle);
        self.count.send_replace(sessions.len());
    }

    pub async fn remove(&self, peer: &SocketAddr) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(peer);
        self.count.send_replace(sessions.len());
    }

    pub fn len(&self) -> usize {
        *self.count.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until no sessions remain. Returns `false` if `limit` elapsed first.
    pub async fn wait_empty(&self, limit: Duration) -> bool {
        let mut rx = self.count.subscribe();
        timeout(limit, rx.wait_for(|n| *n == 0)).await.is_ok()
    }

    /// Aborts every remaining session task. Returns how many were aborted.
    pub async fn abort_all(&self) -> usize {
        let sessions = self.sessions.lock().await;
        for handle in sessions.values() {
            handle.abort();
        }
        sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_sessions_and_aborts_stragglers() {
        let registry = SessionRegistry::new();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let task = tokio::spawn(std::future::pending::<()>());

        registry.insert(peer, task.abort_handle()).await;
        assert_eq!(registry.len(), 1);
        assert!(!registry.wait_empty(Duration::from_millis(50)).await);

        assert_eq!(registry.abort_all().await, 1);
        assert!(task.await.unwrap_err().is_cancelled());
        registry.remove(&peer).await;
        assert!(registry.is_empty());
        assert!(registry.wait_empty(Duration::from_millis(50)).await);
    }
}
