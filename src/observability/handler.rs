//! Outer diagnostic decorator around a connection's event handler.

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use tracing::Level;

use crate::http::ProtocolError;
use crate::net::connection::ConnectionId;
use crate::net::event::IoEventHandler;
use crate::observability::logging::DiagnosticSink;

/// Traces when the wrapped handler starts, finishes and fails.
pub struct LoggingEventHandler {
    inner: Box<dyn IoEventHandler>,
    id: ConnectionId,
    sink: Arc<dyn DiagnosticSink>,
}

impl LoggingEventHandler {
    pub fn new(inner: Box<dyn IoEventHandler>, id: ConnectionId, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { inner, id, sink }
    }
}

impl IoEventHandler for LoggingEventHandler {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProtocolError>> {
        let Self { inner, id, sink } = *self;
        Box::pin(async move {
            if sink.enabled(Level::DEBUG) {
                sink.emit(&id, Level::DEBUG, format_args!("connected"));
            }
            let started = Instant::now();

            let result = inner.run().await;

            if sink.enabled(Level::DEBUG) {
                if let Err(e) = &result {
                    sink.emit(&id, Level::DEBUG, format_args!("exception: {e}"));
                }
                sink.emit(
                    &id,
                    Level::DEBUG,
                    format_args!("disconnected after {:?}", started.elapsed()),
                );
            }
            result
        })
    }
}
