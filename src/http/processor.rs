//! Request/response protocol processing applied around every exchange.
//!
//! # Responsibilities
//! - Validate request heads before they reach an exchange handler
//! - Decorate response heads (server identification)
//!
//! # Design Decisions
//! - Processors only see heads; bodies stay streaming
//! - A rejected request becomes a 400 on that stream only, never a
//!   connection error

use hyper::http::header::{CONTENT_LENGTH, SERVER};
use hyper::http::{request, response, HeaderValue};
use thiserror::Error;

/// A request head failed processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("invalid request: {0}")]
    BadRequest(String),
}

/// Interceptor chain applied to each exchange.
pub trait HttpProcessor: Send + Sync {
    fn process_request(&self, head: &mut request::Parts) -> Result<(), ProcessError>;
    fn process_response(&self, head: &mut response::Parts);
}

/// Default HTTP/2 server processing.
#[derive(Debug, Clone)]
pub struct StandardProcessor {
    server: HeaderValue,
}

impl StandardProcessor {
    pub fn new(server: HeaderValue) -> Self {
        Self { server }
    }
}

impl Default for StandardProcessor {
    fn default() -> Self {
        Self::new(HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )))
    }
}

impl HttpProcessor for StandardProcessor {
    fn process_request(&self, head: &mut request::Parts) -> Result<(), ProcessError> {
        if let Some(value) = head.headers.get(CONTENT_LENGTH) {
            let valid = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .is_some();
            if !valid {
                return Err(ProcessError::BadRequest("malformed content-length".to_string()));
            }
        }
        Ok(())
    }

    fn process_response(&self, head: &mut response::Parts) {
        if !head.headers.contains_key(SERVER) {
            head.headers.insert(SERVER, self.server.clone());
        }
    }
}
