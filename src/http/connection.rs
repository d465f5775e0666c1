//! Connection view and lifecycle callbacks exposed by the negotiation layer.

use std::fmt;
use std::net::SocketAddr;

use crate::http::error::ProtocolError;
use crate::net::session::IoSession;

/// Snapshot of an HTTP connection's endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpConnection {
    pub local_addr: Option<SocketAddr>,
    pub peer_addr: Option<SocketAddr>,
    pub secure: bool,
}

impl HttpConnection {
    pub fn from_session(session: &dyn IoSession) -> Self {
        Self {
            local_addr: session.local_addr(),
            peer_addr: session.peer_addr(),
            secure: session.is_secure(),
        }
    }
}

impl fmt::Display for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        match self.local_addr {
            Some(addr) => write!(f, "{addr}")?,
            None => f.write_str("?")?,
        }
        f.write_str("->")?;
        match self.peer_addr {
            Some(addr) => write!(f, "{addr}")?,
            None => f.write_str("?")?,
        }
        f.write_str("]")
    }
}

/// Lifecycle callbacks invoked by the negotiator.
///
/// For one connection `on_connect` fires at most once, `on_error` at most once
/// for the fatal cause, and `on_disconnect` exactly once after `on_connect`.
pub trait ConnectionListener: Send + Sync {
    fn on_connect(&self, connection: &HttpConnection);
    fn on_disconnect(&self, connection: &HttpConnection);
    fn on_error(&self, connection: &HttpConnection, cause: &ProtocolError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_both_endpoints() {
        let connection = HttpConnection {
            local_addr: Some("127.0.0.1:8443".parse().unwrap()),
            peer_addr: Some("10.0.0.2:51000".parse().unwrap()),
            secure: true,
        };
        assert_eq!(connection.to_string(), "[127.0.0.1:8443->10.0.0.2:51000]");
        assert_eq!(HttpConnection::default().to_string(), "[?->?]");
    }
}
