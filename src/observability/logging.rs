//! Structured logging and the per-connection diagnostic sink.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Define `DiagnosticSink`, the seam every per-connection diagnostic goes through
//! - Route diagnostics to `tracing` with the connection ID as a field
//!
//! # Design Decisions
//! - Callers check `enabled` before building a message, so a disabled level
//!   costs one guard check and no formatting
//! - Messages are `fmt::Arguments`; only an enabled sink renders them

use std::fmt;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::net::connection::ConnectionId;

/// Target used for every diagnostic emitted through `TracingSink`.
pub const DIAGNOSTIC_TARGET: &str = "h2_incoming::diagnostics";

/// Install the global subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Receives per-connection diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Cheap check whether `level` would be recorded.
    fn enabled(&self, level: Level) -> bool;

    /// Record `message` for connection `id`.
    fn emit(&self, id: &ConnectionId, level: Level, message: fmt::Arguments<'_>);
}

/// Diagnostic sink backed by the global `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn enabled(&self, level: Level) -> bool {
        if level == Level::ERROR {
            tracing::enabled!(target: DIAGNOSTIC_TARGET, Level::ERROR)
        } else if level == Level::WARN {
            tracing::enabled!(target: DIAGNOSTIC_TARGET, Level::WARN)
        } else if level == Level::INFO {
            tracing::enabled!(target: DIAGNOSTIC_TARGET, Level::INFO)
        } else if level == Level::DEBUG {
            tracing::enabled!(target: DIAGNOSTIC_TARGET, Level::DEBUG)
        } else {
            tracing::enabled!(target: DIAGNOSTIC_TARGET, Level::TRACE)
        }
    }

    fn emit(&self, id: &ConnectionId, level: Level, message: fmt::Arguments<'_>) {
        if level == Level::ERROR {
            tracing::error!(target: DIAGNOSTIC_TARGET, connection_id = %id, "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(target: DIAGNOSTIC_TARGET, connection_id = %id, "{}", message);
        } else if level == Level::INFO {
            tracing::info!(target: DIAGNOSTIC_TARGET, connection_id = %id, "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: DIAGNOSTIC_TARGET, connection_id = %id, "{}", message);
        } else {
            tracing::trace!(target: DIAGNOSTIC_TARGET, connection_id = %id, "{}", message);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// One captured diagnostic.
    #[derive(Debug, Clone)]
    pub(crate) struct Record {
        pub id: String,
        pub level: Level,
        pub message: String,
    }

    /// Sink that records everything at or above `max_level`.
    #[derive(Debug)]
    pub(crate) struct RecordingSink {
        max_level: Level,
        records: Mutex<Vec<Record>>,
    }

    impl RecordingSink {
        pub(crate) fn new(max_level: Level) -> Self {
            Self {
                max_level,
                records: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn records(&self) -> Vec<Record> {
            self.records.lock().unwrap().clone()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.records().into_iter().map(|r| r.message).collect()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn enabled(&self, level: Level) -> bool {
            // tracing orders more verbose levels as greater.
            level <= self.max_level
        }

        fn emit(&self, id: &ConnectionId, level: Level, message: fmt::Arguments<'_>) {
            assert!(self.enabled(level), "emitted {level} without enabled check");
            self.records.lock().unwrap().push(Record {
                id: id.to_string(),
                level,
                message: message.to_string(),
            });
        }
    }
}
