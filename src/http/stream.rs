//! Per-stream event contract.

use hyper::http::{request, response};

use crate::http::connection::HttpConnection;

/// Receives header events for each stream the multiplexer serves.
///
/// `stream` numbers streams in the order the multiplexer accepted them on the
/// connection, starting at 1.
pub trait StreamListener: Send + Sync {
    fn on_headers_input(&self, connection: &HttpConnection, stream: u64, head: &request::Parts);
    fn on_headers_output(&self, connection: &HttpConnection, stream: u64, head: &response::Parts);
}
