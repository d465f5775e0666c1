//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Per connection (all tagged with the ConnectionId):
//!     → handler.rs  (outer decorator: handler start / finish / exception)
//!     → session.rs  (session decorator: bytes read / written, wire dump)
//!     → stream.rs   (stream listener: header blocks per stream)
//!     → logging.rs  (DiagnosticSink → tracing)
//!
//! Process wide:
//!     → metrics.rs (connection and stream counters, Prometheus exporter)
//! ```
//!
//! # Design Decisions
//! - Decorators are transparent: removing them changes no protocol behavior
//! - Every emission is guarded by a level check before formatting
//! - The session decorator can sit at two layers of one connection,
//!   distinguished by a layer label

pub mod handler;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod stream;

pub use handler::LoggingEventHandler;
pub use logging::{init_logging, DiagnosticSink, TracingSink};
pub use session::LoggingSession;
pub use stream::LoggingStreamListener;
