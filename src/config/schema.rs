//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the HTTP/2 server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// HTTP/2 protocol tuning shared by every connection.
    pub h2: H2Config,

    /// Header character coding shared by every connection.
    pub char_coding: CharCodingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Optional TLS configuration. Without it connections stay in clear text.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// HTTP/2 settings applied to each stream multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct H2Config {
    /// SETTINGS_INITIAL_WINDOW_SIZE for streams.
    pub initial_window_size: u32,

    /// Connection-level flow control window.
    pub connection_window_size: u32,

    /// SETTINGS_MAX_FRAME_SIZE.
    pub max_frame_size: u32,

    /// SETTINGS_MAX_CONCURRENT_STREAMS.
    pub max_concurrent_streams: u32,

    /// SETTINGS_MAX_HEADER_LIST_SIZE.
    pub max_header_list_size: u32,

    /// Interval between keep-alive PINGs. Disabled when absent.
    pub keep_alive_interval_secs: Option<u64>,
}

impl Default for H2Config {
    fn default() -> Self {
        Self {
            initial_window_size: 65_535,
            connection_window_size: 65_535,
            max_frame_size: 16_384,
            max_concurrent_streams: 100,
            max_header_list_size: 16_384,
            keep_alive_interval_secs: None,
        }
    }
}

/// Character set used to interpret header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Charset {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "us-ascii")]
    UsAscii,
    #[serde(rename = "iso-8859-1")]
    Latin1,
}

/// What to do with bytes that are not valid in the configured charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedInputAction {
    /// Reject the request.
    #[default]
    Report,
    /// Substitute a replacement character and continue.
    Replace,
}

/// Header character coding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CharCodingConfig {
    pub charset: Charset,
    pub malformed_input: MalformedInputAction,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Prefix of connection IDs (e.g. "http2-incoming-7").
    pub connection_id_prefix: String,

    /// Also trace raw transport bytes before negotiation.
    pub trace_transport: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "h2_incoming=info".to_string(),
            connection_id_prefix: "http2-incoming".to_string(),
            trace_transport: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for open connections to finish after shutdown starts.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_secs: 10 }
    }
}
