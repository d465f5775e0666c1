//! Reactor-facing handler contracts.

use futures_util::future::BoxFuture;

use crate::handler::HandshakeError;
use crate::http::ProtocolError;
use crate::net::session::BoxedSession;

/// Stateful handler for one connection, driven to completion by the reactor.
///
/// The handler owns its session; when `run` resolves the connection is closed.
/// Errors returned here have already been reported through the connection's
/// diagnostics and are informational to the reactor.
pub trait IoEventHandler: Send {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProtocolError>>;
}

/// Produces one handler per accepted session.
pub trait IoEventHandlerFactory: Send + Sync {
    fn create(&self, session: BoxedSession) -> Result<Box<dyn IoEventHandler>, HandshakeError>;
}
