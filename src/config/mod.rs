//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → H2Config / CharCodingConfig shared via Arc by every connection
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no connection may mutate it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with_overrides, ConfigError};
pub use schema::{
    CharCodingConfig, Charset, H2Config, ListenerConfig, MalformedInputAction,
    ObservabilityConfig, ServerConfig, ShutdownConfig, TlsConfig,
};
