//! Accept loop driving one handler per connection.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Wrap each stream in a `ReactorSession` and ask the factory for a handler
//! - Run every handler on its own task, tracked for graceful shutdown
//! - Drain on shutdown, aborting connections that outlive the grace period

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::ShutdownConfig;
use crate::net::connection::ConnectionTracker;
use crate::net::event::IoEventHandlerFactory;
use crate::net::listener::{Listener, ListenerError};
use crate::net::session::{BoxedSession, ReactorSession};
use crate::observability::metrics;

/// Reactor for HTTP/2 connections.
pub struct H2Server {
    factory: Arc<dyn IoEventHandlerFactory>,
    grace_period: Duration,
    tracker: ConnectionTracker,
}

impl H2Server {
    pub fn new(factory: Arc<dyn IoEventHandlerFactory>, shutdown: &ShutdownConfig) -> Self {
        Self {
            factory,
            grace_period: Duration::from_secs(shutdown.grace_period_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Active-connection tracker, for observing drain progress.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP/2 server starting");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => {
                    let (stream, peer_addr, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let session: BoxedSession = Box::new(ReactorSession::from_tcp(stream));
                    let handler = match self.factory.create(session) {
                        Ok(handler) => handler,
                        Err(e) => {
                            // The session was dropped with the error, closing the socket.
                            tracing::warn!(peer_addr = %peer_addr, error = %e, "Connection rejected");
                            metrics::record_connection_error("handshake");
                            continue;
                        }
                    };

                    let guard = self.tracker.track();
                    connections.spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        if let Err(e) = handler.run().await {
                            tracing::trace!(peer_addr = %peer_addr, error = %e, "Connection ended with error");
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                    }
                }
            }
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            grace_period = ?self.grace_period,
            "Shutdown started, draining connections"
        );
        let drained = tokio::time::timeout(self.grace_period, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Grace period elapsed, aborting connections"
            );
            connections.shutdown().await;
        }

        tracing::info!("HTTP/2 server stopped");
        Ok(())
    }
}
