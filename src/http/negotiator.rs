//! Server-side HTTP/2 protocol negotiation.
//!
//! # Responsibilities
//! - Read and verify the client connection preface (prior knowledge or `h2` via ALPN)
//! - Build the stream multiplexer over the negotiated session
//! - Report connect / error / disconnect to the connection listener
//!
//! # Design Decisions
//! - The multiplexer session passes through a `SessionWrapper` supplied by
//!   the handler factory; this is the only hook into negotiation
//! - Preface bytes are replayed to the multiplexer, which validates them again
//! - Recovery is not attempted: a failed negotiation closes the connection

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::io::AsyncReadExt;

use crate::config::{CharCodingConfig, H2Config};
use crate::http::connection::{ConnectionListener, HttpConnection};
use crate::http::error::ProtocolError;
use crate::http::exchange::ExchangeHandlerFactory;
use crate::http::multiplexer::{MultiplexerContext, StreamMultiplexer};
use crate::http::processor::HttpProcessor;
use crate::http::stream::StreamListener;
use crate::net::connection::{trace_transition, ConnectionId, ConnectionState};
use crate::net::event::IoEventHandler;
use crate::net::session::{BoxedSession, RewindSession};
use crate::net::tls::ALPN_H2;
use crate::observability::metrics;

/// HTTP/2 client connection preface (RFC 9113 §3.4).
pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Replaces the session handed to the multiplexer.
#[derive(Clone)]
pub struct SessionWrapper(Arc<dyn Fn(BoxedSession) -> BoxedSession + Send + Sync>);

impl SessionWrapper {
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(BoxedSession) -> BoxedSession + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    /// A wrapper that returns the session unchanged.
    pub fn identity() -> Self {
        Self::new(|session| session)
    }

    pub fn wrap(&self, session: BoxedSession) -> BoxedSession {
        (self.0)(session)
    }
}

impl Default for SessionWrapper {
    fn default() -> Self {
        Self::identity()
    }
}

/// Collaborators a negotiator is constructed with.
pub struct NegotiatorParts {
    pub id: ConnectionId,
    pub session: BoxedSession,
    pub processor: Arc<dyn HttpProcessor>,
    pub exchange_handlers: Arc<dyn ExchangeHandlerFactory>,
    pub char_coding: Arc<CharCodingConfig>,
    pub h2: Arc<H2Config>,
    pub connection_listener: Arc<dyn ConnectionListener>,
    pub stream_listener: Arc<dyn StreamListener>,
    pub session_wrapper: SessionWrapper,
}

/// Builds the negotiator for one connection.
pub trait NegotiatorFactory: Send + Sync {
    fn create(&self, parts: NegotiatorParts) -> Box<dyn IoEventHandler>;
}

/// Creates `ServerProtocolNegotiator`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct H2NegotiatorFactory;

impl NegotiatorFactory for H2NegotiatorFactory {
    fn create(&self, parts: NegotiatorParts) -> Box<dyn IoEventHandler> {
        Box::new(ServerProtocolNegotiator::new(parts))
    }
}

/// Negotiates HTTP/2 and then serves the connection.
pub struct ServerProtocolNegotiator {
    session: BoxedSession,
    negotiation: Negotiation,
}

struct Negotiation {
    id: ConnectionId,
    processor: Arc<dyn HttpProcessor>,
    exchange_handlers: Arc<dyn ExchangeHandlerFactory>,
    char_coding: Arc<CharCodingConfig>,
    h2: Arc<H2Config>,
    connection_listener: Arc<dyn ConnectionListener>,
    stream_listener: Arc<dyn StreamListener>,
    session_wrapper: SessionWrapper,
    state: ConnectionState,
}

impl ServerProtocolNegotiator {
    pub fn new(parts: NegotiatorParts) -> Self {
        let NegotiatorParts {
            id,
            session,
            processor,
            exchange_handlers,
            char_coding,
            h2,
            connection_listener,
            stream_listener,
            session_wrapper,
        } = parts;
        Self {
            session,
            negotiation: Negotiation {
                id,
                processor,
                exchange_handlers,
                char_coding,
                h2,
                connection_listener,
                stream_listener,
                session_wrapper,
                state: ConnectionState::Negotiating,
            },
        }
    }
}

impl IoEventHandler for ServerProtocolNegotiator {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProtocolError>> {
        let Self { session, negotiation } = *self;
        Box::pin(negotiation.serve(session))
    }
}

impl Negotiation {
    fn transition(&mut self, next: ConnectionState) {
        trace_transition(&self.id, self.state, next);
        self.state = next;
    }

    /// Multiplexer construction step. The wrapper sees the negotiated session first.
    fn create_stream_multiplexer(&self, session: BoxedSession, connection: HttpConnection) -> StreamMultiplexer {
        let session = self.session_wrapper.wrap(session);
        StreamMultiplexer::new(
            session,
            connection,
            MultiplexerContext {
                id: self.id.clone(),
                processor: Arc::clone(&self.processor),
                exchange_handlers: Arc::clone(&self.exchange_handlers),
                char_coding: Arc::clone(&self.char_coding),
                h2: Arc::clone(&self.h2),
                stream_listener: Arc::clone(&self.stream_listener),
            },
        )
    }

    async fn serve(mut self, mut session: BoxedSession) -> Result<(), ProtocolError> {
        let preface = match negotiate(&mut session).await {
            Ok(preface) => preface,
            Err(e) => {
                self.fail(&HttpConnection::from_session(&*session), &e);
                return Err(e);
            }
        };

        let connection = HttpConnection::from_session(&*session);
        let session: BoxedSession = Box::new(RewindSession::new(preface, session));
        let multiplexer = self.create_stream_multiplexer(session, connection.clone());
        self.transition(ConnectionState::Active);
        self.connection_listener.on_connect(&connection);

        let result = multiplexer.serve().await;
        match &result {
            Err(e) => self.fail(&connection, e),
            Ok(()) => self.transition(ConnectionState::Closed),
        }
        self.connection_listener.on_disconnect(&connection);
        result
    }

    fn fail(&mut self, connection: &HttpConnection, cause: &ProtocolError) {
        self.transition(ConnectionState::Closed);
        if !cause.is_benign() {
            metrics::record_connection_error(cause.kind());
        }
        self.connection_listener.on_error(connection, cause);
    }
}

/// Read the client preface, then check the TLS-negotiated protocol.
async fn negotiate(session: &mut BoxedSession) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; PREFACE.len()];
    let mut filled = 0;
    while filled < PREFACE.len() {
        let n = session.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if buf[filled..filled + n] != PREFACE[filled..filled + n] {
            return Err(match session.alpn_protocol() {
                Some(protocol) if protocol != ALPN_H2 => unsupported(protocol),
                _ => ProtocolError::UnexpectedPreface,
            });
        }
        filled += n;
    }

    match session.alpn_protocol() {
        Some(protocol) if protocol != ALPN_H2 => Err(unsupported(protocol)),
        _ => Ok(buf),
    }
}

fn unsupported(protocol: &[u8]) -> ProtocolError {
    ProtocolError::UnsupportedProtocol(String::from_utf8_lossy(protocol).into_owned())
}
