//! HTTP/2 stream multiplexer over a negotiated session.
//!
//! # Responsibilities
//! - Apply `H2Config` to hyper's HTTP/2 server connection
//! - Number streams and report their header blocks to the stream listener
//! - Run each exchange through charset checks, the processor and a handler
//!
//! # Design Decisions
//! - Framing, HPACK and flow control stay inside hyper
//! - Per-stream failures become error responses; only connection-level
//!   failures end `serve`

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::http::header::CONTENT_TYPE;
use hyper::http::{request, HeaderValue, Request, Response, StatusCode};
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};

use crate::config::{CharCodingConfig, H2Config};
use crate::http::connection::HttpConnection;
use crate::http::error::ProtocolError;
use crate::http::exchange::ExchangeHandlerFactory;
use crate::http::processor::HttpProcessor;
use crate::http::stream::StreamListener;
use crate::net::connection::ConnectionId;
use crate::net::session::BoxedSession;
use crate::observability::metrics;

/// Everything a multiplexer needs besides its session.
#[derive(Clone)]
pub struct MultiplexerContext {
    pub id: ConnectionId,
    pub processor: Arc<dyn HttpProcessor>,
    pub exchange_handlers: Arc<dyn ExchangeHandlerFactory>,
    pub char_coding: Arc<CharCodingConfig>,
    pub h2: Arc<H2Config>,
    pub stream_listener: Arc<dyn StreamListener>,
}

/// Serves HTTP/2 streams over one session.
pub struct StreamMultiplexer {
    session: BoxedSession,
    connection: HttpConnection,
    context: MultiplexerContext,
}

impl StreamMultiplexer {
    pub fn new(session: BoxedSession, connection: HttpConnection, context: MultiplexerContext) -> Self {
        Self {
            session,
            connection,
            context,
        }
    }

    /// Serve until the peer or the protocol ends the connection.
    pub async fn serve(self) -> Result<(), ProtocolError> {
        let mut builder = http2::Builder::new(TokioExecutor::new());
        apply_settings(&mut builder, &self.context.h2);

        let exchanges = Arc::new(Exchanges {
            connection: self.connection,
            context: self.context,
            streams: AtomicU64::new(0),
        });
        let service = service_fn(move |request: Request<Incoming>| {
            let exchanges = Arc::clone(&exchanges);
            async move { Ok::<_, Infallible>(exchanges.exchange(request).await) }
        });

        builder
            .serve_connection(TokioIo::new(self.session), service)
            .await
            .map_err(ProtocolError::from)
    }
}

fn apply_settings(builder: &mut http2::Builder<TokioExecutor>, h2: &H2Config) {
    builder
        .initial_stream_window_size(h2.initial_window_size)
        .initial_connection_window_size(h2.connection_window_size)
        .max_frame_size(h2.max_frame_size)
        .max_concurrent_streams(h2.max_concurrent_streams)
        .max_header_list_size(h2.max_header_list_size);
    if let Some(secs) = h2.keep_alive_interval_secs {
        builder
            .timer(TokioTimer::new())
            .keep_alive_interval(Duration::from_secs(secs));
    }
}

struct Exchanges {
    connection: HttpConnection,
    context: MultiplexerContext,
    streams: AtomicU64,
}

impl Exchanges {
    async fn exchange(&self, request: Request<Incoming>) -> Response<Body> {
        let stream = self.streams.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_stream();

        let (head, body) = request.into_parts();
        self.context
            .stream_listener
            .on_headers_input(&self.connection, stream, &head);

        let response = self.dispatch(stream, head, Body::new(body)).await;

        let (mut parts, body) = response.into_parts();
        self.context.processor.process_response(&mut parts);
        self.context
            .stream_listener
            .on_headers_output(&self.connection, stream, &parts);
        Response::from_parts(parts, body)
    }

    async fn dispatch(&self, stream: u64, mut head: request::Parts, body: Body) -> Response<Body> {
        if let Err(e) = self.context.char_coding.check_headers(&head.headers) {
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        if let Err(e) = self.context.processor.process_request(&mut head) {
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        let Some(handler) = self.context.exchange_handlers.create(&head) else {
            return error_response(StatusCode::NOT_FOUND, "Resource not found".to_string());
        };

        match handler.handle(Request::from_parts(head, body)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.context.id,
                    stream,
                    error = %e,
                    "Exchange handler failed"
                );
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
