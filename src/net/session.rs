//! Transport sessions handed from the reactor to connection handlers.
//!
//! # Responsibilities
//! - Define the `IoSession` capability set (read, write, close, addresses)
//! - Expose the optional in-place TLS upgrade (`TransportSecurityLayer`)
//! - Provide `ReactorSession`, the TCP-backed session with a lazy TLS handshake
//! - Provide `RewindSession`, which replays bytes consumed during negotiation
//!
//! # Design Decisions
//! - `start_tls` only switches the transport mode; the handshake itself runs
//!   on the first read/write poll, so it always precedes protocol bytes
//! - Sessions are boxed (`BoxedSession`) so decorators can stack freely

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::rustls::ServerConnection;
use tokio_rustls::server::TlsStream;
use tokio_rustls::{Accept, TlsAcceptor};

use crate::net::tls::SecurityContext;

/// One accepted transport connection's byte channel.
pub trait IoSession: AsyncRead + AsyncWrite + Send + Unpin {
    /// Remote address, when the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Local address, when the transport has one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// True once the session has been switched to TLS.
    fn is_secure(&self) -> bool {
        false
    }

    /// Application protocol agreed through ALPN, available after the handshake.
    fn alpn_protocol(&self) -> Option<&[u8]> {
        None
    }

    /// In-place TLS upgrade capability, if the transport supports it.
    fn transport_security(&mut self) -> Option<&mut dyn TransportSecurityLayer> {
        None
    }
}

pub type BoxedSession = Box<dyn IoSession>;

/// Errors raised while switching a session to TLS.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `start_tls` was called on a session that is already secure or closed.
    #[error("session is not in clear-text mode")]
    AlreadySecured,

    /// A session verifier refused the peer.
    #[error("peer rejected: {0}")]
    Rejected(String),
}

/// TLS parameters observed when the handshake completes.
#[derive(Debug, Clone, Default)]
pub struct TlsDetails {
    pub alpn_protocol: Option<Vec<u8>>,
    pub server_name: Option<String>,
    pub protocol_version: Option<String>,
    pub peer_certificates: usize,
}

impl TlsDetails {
    fn from_connection(conn: &ServerConnection) -> Self {
        Self {
            alpn_protocol: conn.alpn_protocol().map(<[u8]>::to_vec),
            server_name: conn.server_name().map(str::to_owned),
            protocol_version: conn.protocol_version().map(|v| format!("{v:?}")),
            peer_certificates: conn.peer_certificates().map_or(0, <[_]>::len),
        }
    }
}

/// Checks the peer after the handshake; an error aborts the session.
pub type SessionVerifier = Box<dyn Fn(&TlsDetails) -> Result<(), TransportError> + Send + Sync>;

/// Invoked once when the handshake completes.
pub type HandshakeCallback = Box<dyn FnOnce(&TlsDetails) + Send>;

/// Optional knobs for `start_tls`. `Default` means none of them.
#[derive(Default)]
pub struct TlsStartOptions {
    pub verifier: Option<SessionVerifier>,
    pub on_handshake: Option<HandshakeCallback>,
    /// Restricts ALPN to a single protocol.
    pub application_protocol: Option<Vec<u8>>,
}

impl TlsStartOptions {
    pub fn is_empty(&self) -> bool {
        self.verifier.is_none() && self.on_handshake.is_none() && self.application_protocol.is_none()
    }
}

impl fmt::Debug for TlsStartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsStartOptions")
            .field("verifier", &self.verifier.is_some())
            .field("on_handshake", &self.on_handshake.is_some())
            .field("application_protocol", &self.application_protocol)
            .finish()
    }
}

/// Switches a session to TLS in place.
pub trait TransportSecurityLayer {
    fn start_tls(
        &mut self,
        context: &SecurityContext,
        options: TlsStartOptions,
    ) -> Result<(), TransportError>;
}

enum Transport<S> {
    Plain(S),
    Handshaking(Pin<Box<Accept<S>>>),
    Secure(Box<TlsStream<S>>),
    Closed,
}

/// Session over a raw stream that can be upgraded to TLS.
pub struct ReactorSession<S> {
    transport: Transport<S>,
    peer_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    verifier: Option<SessionVerifier>,
    on_handshake: Option<HandshakeCallback>,
}

impl ReactorSession<TcpStream> {
    /// Wrap an accepted TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let local_addr = stream.local_addr().ok();
        Self::new(stream).with_addrs(peer_addr, local_addr)
    }
}

impl<S> ReactorSession<S> {
    pub fn new(io: S) -> Self {
        Self {
            transport: Transport::Plain(io),
            peer_addr: None,
            local_addr: None,
            verifier: None,
            on_handshake: None,
        }
    }

    pub fn with_addrs(mut self, peer_addr: Option<SocketAddr>, local_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self.local_addr = local_addr;
        self
    }
}

impl<S> ReactorSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Drive a pending handshake. Ready(Ok) means the transport can carry data.
    fn poll_handshake(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = match &mut self.transport {
            Transport::Handshaking(accept) => ready!(accept.as_mut().poll(cx)),
            Transport::Closed => return Poll::Ready(Err(not_connected())),
            _ => return Poll::Ready(Ok(())),
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                self.transport = Transport::Closed;
                return Poll::Ready(Err(e));
            }
        };

        let details = TlsDetails::from_connection(stream.get_ref().1);
        if let Some(verifier) = &self.verifier {
            if let Err(e) = verifier(&details) {
                self.transport = Transport::Closed;
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::PermissionDenied, e)));
            }
        }
        if let Some(callback) = self.on_handshake.take() {
            callback(&details);
        }

        self.transport = Transport::Secure(Box::new(stream));
        Poll::Ready(Ok(()))
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "session closed")
}

impl<S> AsyncRead for ReactorSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_handshake(cx))?;
        match &mut this.transport {
            Transport::Plain(io) => Pin::new(io).poll_read(cx, buf),
            Transport::Secure(tls) => Pin::new(&mut **tls).poll_read(cx, buf),
            _ => Poll::Ready(Err(not_connected())),
        }
    }
}

impl<S> AsyncWrite for ReactorSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_handshake(cx))?;
        match &mut this.transport {
            Transport::Plain(io) => Pin::new(io).poll_write(cx, buf),
            Transport::Secure(tls) => Pin::new(&mut **tls).poll_write(cx, buf),
            _ => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_handshake(cx))?;
        match &mut this.transport {
            Transport::Plain(io) => Pin::new(io).poll_flush(cx),
            Transport::Secure(tls) => Pin::new(&mut **tls).poll_flush(cx),
            _ => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match &mut this.transport {
            Transport::Plain(io) => Pin::new(io).poll_shutdown(cx),
            Transport::Secure(tls) => Pin::new(&mut **tls).poll_shutdown(cx),
            // Abandoning a handshake is a close.
            Transport::Handshaking(_) => {
                this.transport = Transport::Closed;
                Poll::Ready(Ok(()))
            }
            Transport::Closed => Poll::Ready(Ok(())),
        }
    }
}

impl<S> IoSession for ReactorSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn is_secure(&self) -> bool {
        matches!(self.transport, Transport::Handshaking(_) | Transport::Secure(_))
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        match &self.transport {
            Transport::Secure(tls) => tls.get_ref().1.alpn_protocol(),
            _ => None,
        }
    }

    fn transport_security(&mut self) -> Option<&mut dyn TransportSecurityLayer> {
        Some(self)
    }
}

impl<S> TransportSecurityLayer for ReactorSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn start_tls(
        &mut self,
        context: &SecurityContext,
        options: TlsStartOptions,
    ) -> Result<(), TransportError> {
        let io = match std::mem::replace(&mut self.transport, Transport::Closed) {
            Transport::Plain(io) => io,
            other => {
                self.transport = other;
                return Err(TransportError::AlreadySecured);
            }
        };

        let config = match options.application_protocol {
            Some(protocol) => context.restricted_to(protocol),
            None => context.server_config(),
        };
        self.verifier = options.verifier;
        self.on_handshake = options.on_handshake;
        self.transport = Transport::Handshaking(Box::pin(TlsAcceptor::from(config).accept(io)));
        Ok(())
    }
}

/// Replays `prefix` before reading from the wrapped session.
pub struct RewindSession {
    prefix: Vec<u8>,
    pos: usize,
    inner: BoxedSession,
}

impl RewindSession {
    pub fn new(prefix: Vec<u8>, inner: BoxedSession) -> Self {
        Self { prefix, pos: 0, inner }
    }
}

impl AsyncRead for RewindSession {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.prefix.len() {
            let remaining = &this.prefix[this.pos..];
            let n = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..n]);
            this.pos += n;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RewindSession {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl IoSession for RewindSession {
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr()
    }

    fn is_secure(&self) -> bool {
        self.inner.is_secure()
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        self.inner.alpn_protocol()
    }

    fn transport_security(&mut self) -> Option<&mut dyn TransportSecurityLayer> {
        self.inner.transport_security()
    }
}
