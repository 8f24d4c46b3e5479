//! Shared, read-only state handed to every session of one running server.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::auth::Authorizer;
use crate::config::ServerConfig;
use crate::middleware::EventLog;
use crate::storage::PathResolver;
use crate::transfer::DataChannelManager;

/// Built once per `start()`; sessions hold it behind an `Arc`.
pub struct ServerContext {
    pub config: ServerConfig,
    pub authorizer: Authorizer,
    pub resolver: PathResolver,
    pub data_channels: DataChannelManager,
    pub events: EventLog,
    /// Cancelled by `stop()`; observed by control reads and in-flight transfers.
    pub shutdown: CancellationToken,
}

impl ServerContext {
    /// `root` is the canonical root returned by [`ServerConfig::validate`].
    pub fn new(
        config: ServerConfig,
        root: PathBuf,
        events: EventLog,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            authorizer: Authorizer::from_config(&config, root.clone()),
            resolver: PathResolver::new(root),
            data_channels: DataChannelManager::new(&config),
            config,
            events,
            shutdown,
        }
    }
}
