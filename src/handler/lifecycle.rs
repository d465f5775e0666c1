//! Connection lifecycle notifications routed to the diagnostic sink.

use std::sync::Arc;

use tracing::Level;

use crate::http::connection::{ConnectionListener, HttpConnection};
use crate::http::error::ProtocolError;
use crate::net::connection::ConnectionId;
use crate::observability::logging::DiagnosticSink;

/// Reports connect, disconnect and non-benign errors for one connection.
#[derive(Clone)]
pub struct LoggingConnectionListener {
    id: ConnectionId,
    sink: Arc<dyn DiagnosticSink>,
}

impl LoggingConnectionListener {
    pub fn new(id: ConnectionId, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { id, sink }
    }
}

impl ConnectionListener for LoggingConnectionListener {
    fn on_connect(&self, connection: &HttpConnection) {
        if self.sink.enabled(Level::DEBUG) {
            self.sink
                .emit(&self.id, Level::DEBUG, format_args!("{connection} connected"));
        }
    }

    fn on_disconnect(&self, connection: &HttpConnection) {
        if self.sink.enabled(Level::DEBUG) {
            self.sink
                .emit(&self.id, Level::DEBUG, format_args!("{connection} disconnected"));
        }
    }

    fn on_error(&self, connection: &HttpConnection, cause: &ProtocolError) {
        // A peer hanging up mid-operation is the normal end of a connection.
        if cause.is_benign() {
            return;
        }
        if self.sink.enabled(Level::ERROR) {
            self.sink
                .emit(&self.id, Level::ERROR, format_args!("{connection} {cause}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::testing::RecordingSink;

    fn new_listener(sink: &Arc<RecordingSink>) -> (LoggingConnectionListener, ConnectionId) {
        let id = ConnectionId::next(&Arc::from("conn"));
        (LoggingConnectionListener::new(id.clone(), sink.clone()), id)
    }

    #[test]
    fn benign_error_is_silent() {
        let sink = Arc::new(RecordingSink::new(Level::TRACE));
        let (listener, _) = new_listener(&sink);

        listener.on_error(&HttpConnection::default(), &ProtocolError::ConnectionClosed);

        assert!(sink.records().is_empty());
    }

    #[test]
    fn other_error_is_reported_once() {
        let sink = Arc::new(RecordingSink::new(Level::TRACE));
        let (listener, id) = new_listener(&sink);

        listener.on_error(&HttpConnection::default(), &ProtocolError::UnexpectedPreface);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::ERROR);
        assert_eq!(records[0].id, id.to_string());
        assert!(records[0].message.contains("unexpected HTTP/2 preface"));
    }

    #[test]
    fn connect_and_disconnect_need_debug() {
        let sink = Arc::new(RecordingSink::new(Level::INFO));
        let (listener, _) = new_listener(&sink);
        listener.on_connect(&HttpConnection::default());
        listener.on_disconnect(&HttpConnection::default());
        assert!(sink.records().is_empty());

        let sink = Arc::new(RecordingSink::new(Level::DEBUG));
        let (listener, _) = new_listener(&sink);
        listener.on_connect(&HttpConnection::default());
        listener.on_disconnect(&HttpConnection::default());
        assert_eq!(sink.messages(), vec!["[?->?] connected", "[?->?] disconnected"]);
    }
}
