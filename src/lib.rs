//! Instrumented per-connection HTTP/2 handler factory

pub mod config;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use handler::ServerHandlerFactory;
pub use http::H2Server;
pub use lifecycle::Shutdown;
