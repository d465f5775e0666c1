//! TLS configuration and certificate loading.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::{self, ServerConfig};

/// ALPN identifier for HTTP/2 over TLS.
pub const ALPN_H2: &[u8] = b"h2";

/// Errors raised while building a security context.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0:?}")]
    CertificateNotFound(PathBuf),

    #[error("private key file not found: {0:?}")]
    KeyNotFound(PathBuf),

    #[error("no certificates in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no private key in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Immutable server-side TLS settings shared by every connection of a factory.
#[derive(Clone)]
pub struct SecurityContext {
    config: Arc<ServerConfig>,
}

impl SecurityContext {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Load a certificate chain and private key (PEM) and advertise `h2` via ALPN.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        if !cert_path.exists() {
            return Err(TlsError::CertificateNotFound(cert_path.to_path_buf()));
        }
        if !key_path.exists() {
            return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
        }

        let mut cert_reader = BufReader::new(File::open(cert_path)?);
        let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
        }

        let mut key_reader = BufReader::new(File::open(key_path)?);
        let key = rustls_pemfile::private_key(&mut key_reader)?
            .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![ALPN_H2.to_vec()];

        tracing::info!(cert_path = ?cert_path, "TLS certificate loaded");
        Ok(Self::new(Arc::new(config)))
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }

    /// A copy of the server config that offers only `protocol` via ALPN.
    pub fn restricted_to(&self, protocol: Vec<u8>) -> Arc<ServerConfig> {
        let mut config = (*self.config).clone();
        config.alpn_protocols = vec![protocol];
        Arc::new(config)
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alpn: Vec<_> = self
            .config
            .alpn_protocols
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect();
        f.debug_struct("SecurityContext").field("alpn", &alpn).finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_certificate_is_reported() {
        let err = SecurityContext::from_pem_files(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .unwrap_err();
        assert!(matches!(err, TlsError::CertificateNotFound(_)));
    }

    #[test]
    fn restricted_config_offers_single_protocol() {
        let context = testing::unusable_context();
        let config = context.restricted_to(b"h2".to_vec());
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec()]);
        assert!(context.server_config().alpn_protocols.is_empty());
    }
}
