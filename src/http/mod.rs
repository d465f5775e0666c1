//! HTTP/2 protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Session (clear text or TLS)
//!     → negotiator.rs (client preface / ALPN check, lifecycle callbacks)
//!     → multiplexer.rs (hyper HTTP/2 connection, per-stream dispatch)
//!     → processor.rs (request validation, response decoration)
//!     → exchange.rs (handler selected by path prefix)
//!
//! server.rs runs the accept loop that feeds sessions to the handler factory.
//! ```

pub mod charset;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod multiplexer;
pub mod negotiator;
pub mod processor;
pub mod server;
pub mod stream;

pub use connection::{ConnectionListener, HttpConnection};
pub use error::ProtocolError;
pub use exchange::{EchoHandler, ExchangeHandler, ExchangeHandlerFactory, PrefixHandlerFactory};
pub use negotiator::{H2NegotiatorFactory, NegotiatorFactory, NegotiatorParts, SessionWrapper};
pub use processor::{HttpProcessor, StandardProcessor};
pub use server::H2Server;
pub use stream::StreamListener;
