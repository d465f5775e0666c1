//! Conditional TLS upgrade applied before any protocol byte is exchanged.

use thiserror::Error;

use crate::net::session::{BoxedSession, TlsStartOptions, TransportError};
use crate::net::tls::SecurityContext;

/// Errors that reject a connection before a handler is built for it.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A security context is configured but the session cannot switch to TLS.
    #[error("session does not support a TLS upgrade")]
    UpgradeUnsupported,

    #[error("TLS upgrade failed: {0}")]
    Upgrade(#[from] TransportError),
}

/// Upgrade `session` to TLS in place when a security context is configured.
///
/// Without a context the same session is returned untouched. The handshake is
/// started here and completes on the first read or write.
pub fn maybe_secure(
    mut session: BoxedSession,
    context: Option<&SecurityContext>,
) -> Result<BoxedSession, HandshakeError> {
    let Some(context) = context else {
        return Ok(session);
    };

    match session.transport_security() {
        Some(layer) => layer.start_tls(context, TlsStartOptions::default())?,
        None => return Err(HandshakeError::UpgradeUnsupported),
    }
    Ok(session)
}
