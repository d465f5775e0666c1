//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → session.rs (ReactorSession: clear text, or TLS started in place)
//!     → connection.rs (identity, state, active-connection tracking)
//!     → event.rs (handler driven by the reactor task)
//!
//! Connection States:
//!     Created → Secured → Negotiating → Active → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - TLS is started before any protocol byte is read
//! - Sessions are trait objects so diagnostics can decorate them

pub mod connection;
pub mod event;
pub mod listener;
pub mod session;
pub mod tls;

pub use connection::{ConnectionId, ConnectionState, ConnectionTracker};
pub use event::{IoEventHandler, IoEventHandlerFactory};
pub use session::{BoxedSession, IoSession, ReactorSession, TransportSecurityLayer};
pub use tls::SecurityContext;
