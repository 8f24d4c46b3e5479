//! Server middleware
//!
//! Provides the outward event log.

pub mod logging;

pub use logging::{ChannelSink, EventLog, LogCrateSink, LogEntry, LogSink, NullSink};
