//! Shared collaborators for integration tests.
#![allow(dead_code)]

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf};
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::server::{ClientHello, ResolvesServerCert};
use tokio_rustls::rustls::sign::CertifiedKey;
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, ServerConfig, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::Level;

use h2_incoming::http::negotiator::{NegotiatorFactory, NegotiatorParts};
use h2_incoming::http::ProtocolError;
use h2_incoming::net::session::{IoSession, TlsStartOptions, TransportError, TransportSecurityLayer};
use h2_incoming::net::{ConnectionId, IoEventHandler, SecurityContext};
use h2_incoming::observability::DiagnosticSink;

/// One captured diagnostic.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub level: Level,
    pub message: String,
}

/// Sink that records everything at or above `max_level`.
pub struct RecordingSink {
    max_level: Level,
    records: Mutex<Vec<Record>>,
}

impl RecordingSink {
    pub fn new(max_level: Level) -> Arc<Self> {
        Arc::new(Self {
            max_level,
            records: Mutex::new(Vec::new()),
        })
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn at(&self, level: Level) -> Vec<Record> {
        self.records().into_iter().filter(|r| r.level == level).collect()
    }

    /// Wait until a record matching `pred` shows up.
    pub async fn wait_for(&self, pred: impl Fn(&Record) -> bool) -> bool {
        for _ in 0..100 {
            if self.records().iter().any(&pred) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

impl DiagnosticSink for RecordingSink {
    fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    fn emit(&self, id: &ConnectionId, level: Level, message: fmt::Arguments<'_>) {
        assert!(self.enabled(level), "emitted {level} without enabled check");
        self.records.lock().unwrap().push(Record {
            id: id.to_string(),
            level,
            message: message.to_string(),
        });
    }
}

/// Events observed on a `MockSession`, shared with the test.
pub type SessionLog = Arc<Mutex<Vec<String>>>;

/// In-memory session that logs upgrades and reads.
pub struct MockSession {
    io: DuplexStream,
    log: SessionLog,
    upgradable: bool,
    secure: bool,
}

impl MockSession {
    /// Returns the session and the client end of its pipe.
    pub fn new(upgradable: bool) -> (Self, DuplexStream, SessionLog) {
        let (client, server) = tokio::io::duplex(1024);
        let log = SessionLog::default();
        let session = Self {
            io: server,
            log: Arc::clone(&log),
            upgradable,
            secure: false,
        };
        (session, client, log)
    }
}

impl AsyncRead for MockSession {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.log.lock().unwrap().push("read".into());
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockSession {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

impl IoSession for MockSession {
    fn peer_addr(&self) -> Option<SocketAddr> {
        "10.0.0.2:51000".parse().ok()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        "127.0.0.1:8443".parse().ok()
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn transport_security(&mut self) -> Option<&mut dyn TransportSecurityLayer> {
        if self.upgradable {
            Some(self)
        } else {
            None
        }
    }
}

impl TransportSecurityLayer for MockSession {
    fn start_tls(&mut self, _context: &SecurityContext, options: TlsStartOptions) -> Result<(), TransportError> {
        if self.secure {
            return Err(TransportError::AlreadySecured);
        }
        let entry = if options.is_empty() { "start_tls" } else { "start_tls with options" };
        self.log.lock().unwrap().push(entry.into());
        self.secure = true;
        Ok(())
    }
}

/// Address of the value behind a boxed session, for identity checks.
pub fn session_addr(session: &dyn IoSession) -> usize {
    session as *const dyn IoSession as *const () as usize
}

/// What a `RecordingNegotiatorFactory` saw for one connection.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub id: ConnectionId,
    pub session_addr: usize,
    pub secure: bool,
}

/// Negotiator factory that records its inputs and reads one byte when run.
#[derive(Default)]
pub struct RecordingNegotiatorFactory {
    invocations: AtomicUsize,
    seen: Mutex<Vec<Negotiated>>,
}

impl RecordingNegotiatorFactory {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Negotiated> {
        self.seen.lock().unwrap().clone()
    }
}

impl NegotiatorFactory for RecordingNegotiatorFactory {
    fn create(&self, parts: NegotiatorParts) -> Box<dyn IoEventHandler> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Negotiated {
            id: parts.id.clone(),
            session_addr: session_addr(&*parts.session),
            secure: parts.session.is_secure(),
        });
        Box::new(ReadOnce(parts))
    }
}

struct ReadOnce(NegotiatorParts);

impl IoEventHandler for ReadOnce {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<(), ProtocolError>> {
        let mut session = self.0.session;
        Box::pin(async move {
            let mut byte = [0u8; 1];
            session.read(&mut byte).await?;
            Ok(())
        })
    }
}

#[derive(Debug)]
struct NoCertificate;

impl ResolvesServerCert for NoCertificate {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        None
    }
}

/// A security context that is never expected to complete a handshake.
pub fn test_security_context() -> SecurityContext {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(NoCertificate));
    SecurityContext::new(Arc::new(config))
}

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Security context for the `localhost` fixture certificate, offering `h2`.
pub fn fixture_security_context() -> SecurityContext {
    SecurityContext::from_pem_files(&fixture("cert.pem"), &fixture("key.pem")).unwrap()
}

/// Trusts exactly the fixture certificate.
#[derive(Debug)]
struct TrustFixture(Vec<u8>);

impl ServerCertVerifier for TrustFixture {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        if end_entity.as_ref() == self.0.as_slice() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(tokio_rustls::rustls::Error::General("unexpected certificate".into()))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PKCS1_SHA256,
        ]
    }
}

/// TLS client that trusts the fixture certificate and offers `alpn`.
pub fn fixture_tls_client(alpn: &[&str]) -> TlsConnector {
    let pem = std::fs::read(fixture("cert.pem")).unwrap();
    let cert = rustls_pemfile::certs(&mut pem.as_slice()).next().unwrap().unwrap();
    let mut config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(TrustFixture(cert.as_ref().to_vec())))
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
    TlsConnector::from(Arc::new(config))
}

/// Server name matching the fixture certificate.
pub fn fixture_server_name() -> ServerName<'static> {
    ServerName::try_from("localhost").unwrap()
}
