//! Session decorator that traces every byte crossing it.
//!
//! DEBUG records operations and byte counts; TRACE adds a hex/ASCII dump of
//! the payload. The decorator never changes what it forwards.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::Level;

use crate::net::connection::ConnectionId;
use crate::net::session::{BoxedSession, IoSession, TransportSecurityLayer};
use crate::observability::logging::DiagnosticSink;

/// Layer label for the decorator around the raw transport session.
pub const TRANSPORT_LAYER: &str = "transport";

/// Layer label for the decorator installed when the multiplexer is built.
pub const MULTIPLEXER_LAYER: &str = "multiplexer";

const WIRE_LINE: usize = 16;

/// Transparent session wrapper emitting diagnostics under a connection ID.
pub struct LoggingSession {
    inner: BoxedSession,
    id: ConnectionId,
    layer: &'static str,
    sink: Arc<dyn DiagnosticSink>,
}

impl LoggingSession {
    pub fn new(
        inner: BoxedSession,
        id: ConnectionId,
        layer: &'static str,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            inner,
            id,
            layer,
            sink,
        }
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        self.sink.emit(&self.id, Level::DEBUG, args);
    }

    fn wire(&self, direction: &'static str, bytes: &[u8]) {
        if self.sink.enabled(Level::TRACE) {
            self.sink.emit(
                &self.id,
                Level::TRACE,
                format_args!("[{}] {}", self.layer, WireDump { direction, bytes }),
            );
        }
    }

    fn report<T>(&self, op: &'static str, result: &Poll<io::Result<T>>) {
        if let Poll::Ready(Err(e)) = result {
            if self.sink.enabled(Level::DEBUG) {
                self.debug(format_args!("[{}] {} failed: {}", self.layer, op, e));
            }
        }
    }
}

impl AsyncRead for LoggingSession {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        // An empty read only means end of stream when there was room to fill.
        let had_room = buf.remaining() > 0;
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = result {
            let read = &buf.filled()[before..];
            if this.sink.enabled(Level::DEBUG) {
                if read.is_empty() && had_room {
                    this.debug(format_args!("[{}] end of stream", this.layer));
                } else if !read.is_empty() {
                    this.debug(format_args!("[{}] {} bytes read", this.layer, read.len()));
                }
            }
            if !read.is_empty() {
                this.wire("<<", read);
            }
        } else {
            this.report("read", &result);
        }
        result
    }
}

impl AsyncWrite for LoggingSession {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);

        if let Poll::Ready(Ok(written)) = result {
            if this.sink.enabled(Level::DEBUG) {
                this.debug(format_args!("[{}] {} bytes written", this.layer, written));
            }
            this.wire(">>", &buf[..written]);
        } else {
            this.report("write", &result);
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_flush(cx);
        this.report("flush", &result);
        result
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_shutdown(cx);
        if let Poll::Ready(Ok(())) = result {
            if this.sink.enabled(Level::DEBUG) {
                this.debug(format_args!("[{}] shutdown", this.layer));
            }
        } else {
            this.report("shutdown", &result);
        }
        result
    }
}

impl IoSession for LoggingSession {
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

/// Hex dump rendered lazily.
struct WireDump<'a> {
    direction: &'static str,
    bytes: &'a [u8],
}

impl fmt::Display for WireDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.bytes.chunks(WIRE_LINE).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{} ", self.direction)?;
            for pos in 0..WIRE_LINE {
                match line.get(pos) {
                    Some(b) => write!(f, "{b:02x} ")?,
                    None => f.write_str("   ")?,
                }
            }
            f.write_str("|")?;
            for &b in line {
                let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
                write!(f, "{c}")?;
            }
            f.write_str("|")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::ConnectionId;
    use crate::net::session::ReactorSession;
    use crate::observability::logging::testing::RecordingSink;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn wrap(sink: Arc<RecordingSink>) -> (LoggingSession, tokio::io::DuplexStream, ConnectionId) {
        let (client, server) = duplex(256);
        let id = ConnectionId::next(&Arc::from("test"));
        let session = LoggingSession::new(
            Box::new(ReactorSession::new(server)),
            id.clone(),
            MULTIPLEXER_LAYER,
            sink,
        );
        (session, client, id)
    }

    #[tokio::test]
    async fn traces_reads_and_writes_with_identity() {
        let sink = Arc::new(RecordingSink::new(Level::DEBUG));
        let (mut session, mut client, id) = wrap(sink.clone());

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        session.read_exact(&mut buf).await.unwrap();
        session.write_all(b"bye").await.unwrap();
        session.shutdown().await.unwrap();

        assert_eq!(&buf, b"hello");
        assert_eq!(
            sink.messages(),
            vec![
                "[multiplexer] 5 bytes read",
                "[multiplexer] 3 bytes written",
                "[multiplexer] shutdown",
            ]
        );
        assert!(sink.records().iter().all(|r| r.id == id.to_string()));
    }

    #[tokio::test]
    async fn wire_dump_only_at_trace() {
        let sink = Arc::new(RecordingSink::new(Level::TRACE));
        let (mut session, mut client, _id) = wrap(sink.clone());

        client.write_all(b"PRI *").await.unwrap();
        drop(client);
        let mut out = Vec::new();
        session.read_to_end(&mut out).await.unwrap();

        let messages = sink.messages();
        assert!(messages.contains(&"[multiplexer] 5 bytes read".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("[multiplexer] << 50 52 49 20 2a")
            && m.ends_with("|PRI *|")));
        assert_eq!(messages.last().unwrap(), "[multiplexer] end of stream");
    }

    #[tokio::test]
    async fn zero_capacity_read_is_not_end_of_stream() {
        let sink = Arc::new(RecordingSink::new(Level::DEBUG));
        let (mut session, mut client, _id) = wrap(sink.clone());

        client.write_all(b"data").await.unwrap();
        assert_eq!(session.read(&mut []).await.unwrap(), 0);
        let mut buf = [0u8; 4];
        session.read_exact(&mut buf).await.unwrap();

        assert_eq!(sink.messages(), vec!["[multiplexer] 4 bytes read"]);
    }

    #[tokio::test]
    async fn disabled_sink_receives_nothing() {
        let sink = Arc::new(RecordingSink::new(Level::INFO));
        let (mut session, mut client, _id) = wrap(sink.clone());

        client.write_all(b"data").await.unwrap();
        let mut buf = [0u8; 4];
        session.read_exact(&mut buf).await.unwrap();
        session.write_all(&buf).await.unwrap();

        assert!(sink.records().is_empty());
    }

    #[test]
    fn wire_dump_pads_partial_lines() {
        let rendered = WireDump { direction: ">>", bytes: b"\x00A" }.to_string();
        assert_eq!(rendered, format!(">> 00 41 {}|.A|", "   ".repeat(14)));
    }
}
