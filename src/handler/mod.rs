//! Per-connection handler factory.
//!
//! # Data Flow
//! ```text
//! Accepted session
//!     → factory.rs (connection ID)
//!     → security.rs (TLS upgrade when configured)
//!     → negotiator built with lifecycle.rs listener and the multiplexer session wrapper
//!     → outer LoggingEventHandler
//!     → reactor drives the handler
//! ```

pub mod factory;
pub mod lifecycle;
pub mod security;

pub use factory::{ServerHandlerFactory, ServerHandlerFactoryBuilder};
pub use lifecycle::LoggingConnectionListener;
pub use security::{maybe_secure, HandshakeError};
