//! Protocol-level errors and the benign-closure predicate.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Failure while negotiating or serving a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection. Expected, not a defect.
    #[error("connection closed")]
    ConnectionClosed,

    /// The first bytes were not the HTTP/2 client preface.
    #[error("unexpected HTTP/2 preface")]
    UnexpectedPreface,

    /// TLS negotiated an application protocol other than `h2`.
    #[error("unsupported application protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("HTTP/2 error: {0}")]
    Http(#[source] hyper::Error),
}

impl ProtocolError {
    /// True for errors that are the normal outcome of a peer closing the connection.
    pub fn is_benign(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed)
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::ConnectionClosed => "closed",
            ProtocolError::UnexpectedPreface => "preface",
            ProtocolError::UnsupportedProtocol(_) => "alpn",
            ProtocolError::Io(_) => "io",
            ProtocolError::Http(_) => "http2",
        }
    }
}

fn is_peer_close(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        if is_peer_close(e.kind()) {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    }
}

impl From<hyper::Error> for ProtocolError {
    fn from(e: hyper::Error) -> Self {
        if e.is_closed() || e.is_incomplete_message() {
            return ProtocolError::ConnectionClosed;
        }
        let mut source = e.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                if is_peer_close(io_err.kind()) {
                    return ProtocolError::ConnectionClosed;
                }
            }
            source = cause.source();
        }
        ProtocolError::Http(e)
    }
}
