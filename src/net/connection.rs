//! Connection identity, state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique, human-readable connection IDs for diagnostics
//! - Name the per-connection states (Created → Secured → Negotiating → Active → Closed)
//! - Count active connections so the reactor can drain on shutdown

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Prefix used when the caller does not configure one.
pub const DEFAULT_CONNECTION_PREFIX: &str = "conn";

/// Unique identifier for an accepted connection, displayed as `prefix-n`.
///
/// Sequence numbers come from one process-wide counter, so two IDs never
/// compare equal even when their prefixes differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    prefix: Arc<str>,
    seq: u64,
}

impl ConnectionId {
    /// Allocate the next connection ID under `prefix`.
    pub fn next(prefix: &Arc<str>) -> Self {
        Self {
            prefix: Arc::clone(prefix),
            seq: CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Sequence number of this ID.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Label prefix of this ID.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.seq)
    }
}

/// Per-connection handler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Identity assigned, nothing done to the session yet.
    Created,
    /// Security bootstrap applied (no-op without a security context).
    Secured,
    /// Negotiator constructed, waiting for the client preface.
    Negotiating,
    /// Multiplexer built and serving streams.
    Active,
    /// Session closed or failed.
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Created => "created",
            ConnectionState::Secured => "secured",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace one state change of connection `id`.
pub fn trace_transition(id: &ConnectionId, from: ConnectionState, to: ConnectionState) {
    tracing::trace!(
        connection_id = %id,
        from = %from,
        to = %to,
        "Connection state changed"
    );
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::record_connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            idle: Arc::clone(&self.idle),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has been released.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    idle: Arc<Notify>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::record_connection_closed();
        if self.active_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
