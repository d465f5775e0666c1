//! Stream listener that reports per-stream header exchanges.

use std::fmt;
use std::sync::Arc;

use hyper::http::{request, response, HeaderMap};
use tracing::Level;

use crate::http::connection::HttpConnection;
use crate::http::stream::StreamListener;
use crate::net::connection::ConnectionId;
use crate::observability::logging::DiagnosticSink;

/// Emits DEBUG diagnostics for every header block seen on a connection's streams.
pub struct LoggingStreamListener {
    id: ConnectionId,
    sink: Arc<dyn DiagnosticSink>,
}

impl LoggingStreamListener {
    pub fn new(id: ConnectionId, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { id, sink }
    }
}

impl StreamListener for LoggingStreamListener {
    fn on_headers_input(&self, connection: &HttpConnection, stream: u64, head: &request::Parts) {
        if self.sink.enabled(Level::DEBUG) {
            self.sink.emit(
                &self.id,
                Level::DEBUG,
                format_args!(
                    "{} stream {} << {} {} {}",
                    connection,
                    stream,
                    head.method,
                    head.uri,
                    HeaderBlock(&head.headers)
                ),
            );
        }
    }

    fn on_headers_output(&self, connection: &HttpConnection, stream: u64, head: &response::Parts) {
        if self.sink.enabled(Level::DEBUG) {
            self.sink.emit(
                &self.id,
                Level::DEBUG,
                format_args!(
                    "{} stream {} >> {} {}",
                    connection,
                    stream,
                    head.status.as_u16(),
                    HeaderBlock(&head.headers)
                ),
            );
        }
    }
}

struct HeaderBlock<'a>(&'a HeaderMap);

impl fmt::Display for HeaderBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::testing::RecordingSink;
    use hyper::http::{Request, Response, StatusCode};

    #[test]
    fn reports_request_and_response_heads() {
        let sink = Arc::new(RecordingSink::new(Level::DEBUG));
        let id = ConnectionId::next(&Arc::from("conn"));
        let listener = LoggingStreamListener::new(id.clone(), sink.clone());
        let connection = HttpConnection::default();

        let (request, ()) = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", "text/plain")
            .body(())
            .unwrap()
            .into_parts();
        let (response, ()) = Response::builder()
            .status(StatusCode::CREATED)
            .body(())
            .unwrap()
            .into_parts();

        listener.on_headers_input(&connection, 1, &request);
        listener.on_headers_output(&connection, 1, &response);

        assert_eq!(
            sink.messages(),
            vec![
                "[?->?] stream 1 << POST /upload [content-type: text/plain]",
                "[?->?] stream 1 >> 201 []",
            ]
        );
        assert_eq!(sink.records()[0].id, id.to_string());
    }

    #[test]
    fn silent_when_disabled() {
        let sink = Arc::new(RecordingSink::new(Level::INFO));
        let listener = LoggingStreamListener::new(ConnectionId::next(&Arc::from("conn")), sink.clone());
        let (request, ()) = Request::new(()).into_parts();
        listener.on_headers_input(&HttpConnection::default(), 1, &request);
        assert!(sink.records().is_empty());
    }
}
