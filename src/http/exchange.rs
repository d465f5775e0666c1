//! Application exchange handlers and their selection.
//!
//! # Responsibilities
//! - Define the per-request handler contract
//! - Select a handler for a request head (longest path prefix wins)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex to keep selection O(n) in the number of prefixes

use std::sync::Arc;

use axum::body::Body;
use futures_util::future::BoxFuture;
use hyper::http::{request, Request, Response};
use thiserror::Error;

/// Largest request body `EchoHandler` will buffer.
pub const MAX_ECHO_BODY: usize = 1024 * 1024;

/// An exchange handler could not produce a response.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to read request body: {0}")]
    Body(String),

    /// Raised by application handlers; answered with a 500 on that stream.
    #[error("handler failed: {0}")]
    Handler(String),
}

/// Produces the response for one request.
pub trait ExchangeHandler: Send + Sync {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, ExchangeError>>;
}

/// Selects the handler for a request head; `None` yields a 404.
pub trait ExchangeHandlerFactory: Send + Sync {
    fn create(&self, head: &request::Parts) -> Option<Arc<dyn ExchangeHandler>>;
}

/// Handler registry keyed by path prefix.
#[derive(Default)]
pub struct PrefixHandlerFactory {
    routes: Vec<(String, Arc<dyn ExchangeHandler>)>,
}

impl PrefixHandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for paths starting with `prefix`, replacing an earlier registration.
    pub fn register(mut self, prefix: impl Into<String>, handler: Arc<dyn ExchangeHandler>) -> Self {
        let prefix = prefix.into();
        self.routes.retain(|(existing, _)| *existing != prefix);
        self.routes.push((prefix, handler));
        // Longest prefix first.
        self.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl ExchangeHandlerFactory for PrefixHandlerFactory {
    fn create(&self, head: &request::Parts) -> Option<Arc<dyn ExchangeHandler>> {
        let path = head.uri.path();
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, handler)| Arc::clone(handler))
    }
}

/// Responds with the request line followed by the request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl ExchangeHandler for EchoHandler {
    fn handle(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, ExchangeError>> {
        Box::pin(async move {
            let (head, body) = request.into_parts();
            let bytes = axum::body::to_bytes(body, MAX_ECHO_BODY)
                .await
                .map_err(|e| ExchangeError::Body(e.to_string()))?;

            let mut payload = format!("{} {}\n", head.method, head.uri.path()).into_bytes();
            payload.extend_from_slice(&bytes);
            Ok(Response::new(Body::from(payload)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl ExchangeHandler for Fixed {
        fn handle(&self, _request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, ExchangeError>> {
            let body = self.0;
            Box::pin(async move { Ok(Response::new(Body::from(body))) })
        }
    }

    async fn body_of(handler: &Arc<dyn ExchangeHandler>, path: &str) -> String {
        let response = handler
            .handle(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn head(path: &str) -> request::Parts {
        Request::builder().uri(path).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn longest_prefix_wins() {
        let factory = PrefixHandlerFactory::new()
            .register("/", Arc::new(Fixed("root")))
            .register("/api", Arc::new(Fixed("api")))
            .register("/api/v2", Arc::new(Fixed("v2")));
        assert_eq!(factory.len(), 3);

        let handler = factory.create(&head("/api/v2/items")).unwrap();
        assert_eq!(body_of(&handler, "/api/v2/items").await, "v2");
        let handler = factory.create(&head("/api/v1")).unwrap();
        assert_eq!(body_of(&handler, "/api/v1").await, "api");
        let handler = factory.create(&head("/index.html")).unwrap();
        assert_eq!(body_of(&handler, "/index.html").await, "root");
    }

    #[test]
    fn no_match_yields_none() {
        let factory = PrefixHandlerFactory::new().register("/api", Arc::new(Fixed("api")));
        assert!(factory.create(&head("/other")).is_none());
        assert!(PrefixHandlerFactory::new().is_empty());
    }

    #[tokio::test]
    async fn echo_returns_request_line_and_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/echo?x=1")
            .body(Body::from("payload"))
            .unwrap();
        let response = EchoHandler.handle(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"POST /echo\npayload");
    }
}
