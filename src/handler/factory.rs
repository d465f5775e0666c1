//! Per-connection handler assembly.
//!
//! # Responsibilities
//! - Assign each accepted session its connection ID
//! - Apply the TLS upgrade before anything else touches the session
//! - Build the negotiator with lifecycle and stream listeners for that ID
//! - Install the multiplexer-layer session decorator through the session wrapper
//! - Wrap the negotiator in the outer diagnostic handler
//!
//! # Design Decisions
//! - Required collaborators are checked once, in `build`, never per connection
//! - Configuration and the security context are shared read-only across connections
//! - The transport-layer decorator is opt-in; without it the negotiator sees
//!   the session exactly as the reactor accepted it

use std::sync::Arc;

use tracing::Level;

use crate::config::{CharCodingConfig, ConfigError, H2Config, ServerConfig};
use crate::handler::lifecycle::LoggingConnectionListener;
use crate::handler::security::{maybe_secure, HandshakeError};
use crate::http::exchange::ExchangeHandlerFactory;
use crate::http::negotiator::{H2NegotiatorFactory, NegotiatorFactory, NegotiatorParts, SessionWrapper};
use crate::http::processor::HttpProcessor;
use crate::net::connection::{trace_transition, ConnectionId, ConnectionState, DEFAULT_CONNECTION_PREFIX};
use crate::net::event::{IoEventHandler, IoEventHandlerFactory};
use crate::net::session::BoxedSession;
use crate::net::tls::SecurityContext;
use crate::observability::handler::LoggingEventHandler;
use crate::observability::logging::{DiagnosticSink, TracingSink};
use crate::observability::session::{LoggingSession, MULTIPLEXER_LAYER, TRANSPORT_LAYER};
use crate::observability::stream::LoggingStreamListener;

/// Creates the instrumented handler chain for each incoming HTTP/2 connection.
pub struct ServerHandlerFactory {
    processor: Arc<dyn HttpProcessor>,
    exchange_handlers: Arc<dyn ExchangeHandlerFactory>,
    char_coding: Arc<CharCodingConfig>,
    h2: Arc<H2Config>,
    security_context: Option<SecurityContext>,
    negotiator_factory: Arc<dyn NegotiatorFactory>,
    sink: Arc<dyn DiagnosticSink>,
    id_prefix: Arc<str>,
    trace_transport: bool,
}

impl ServerHandlerFactory {
    pub fn builder() -> ServerHandlerFactoryBuilder {
        ServerHandlerFactoryBuilder::default()
    }

    pub fn is_secure(&self) -> bool {
        self.security_context.is_some()
    }

    fn multiplexer_wrapper(&self, id: &ConnectionId) -> SessionWrapper {
        let id = id.clone();
        let sink = Arc::clone(&self.sink);
        SessionWrapper::new(move |session: BoxedSession| -> BoxedSession {
            Box::new(LoggingSession::new(
                session,
                id.clone(),
                MULTIPLEXER_LAYER,
                Arc::clone(&sink),
            ))
        })
    }
}

impl IoEventHandlerFactory for ServerHandlerFactory {
    fn create(&self, session: BoxedSession) -> Result<Box<dyn IoEventHandler>, HandshakeError> {
        let id = ConnectionId::next(&self.id_prefix);

        let session = match maybe_secure(session, self.security_context.as_ref()) {
            Ok(session) => session,
            Err(e) => {
                if self.sink.enabled(Level::ERROR) {
                    self.sink.emit(&id, Level::ERROR, format_args!("{e}"));
                }
                return Err(e);
            }
        };
        trace_transition(&id, ConnectionState::Created, ConnectionState::Secured);

        let session: BoxedSession = if self.trace_transport {
            Box::new(LoggingSession::new(
                session,
                id.clone(),
                TRANSPORT_LAYER,
                Arc::clone(&self.sink),
            ))
        } else {
            session
        };

        trace_transition(&id, ConnectionState::Secured, ConnectionState::Negotiating);
        let negotiator = self.negotiator_factory.create(NegotiatorParts {
            id: id.clone(),
            session,
            processor: Arc::clone(&self.processor),
            exchange_handlers: Arc::clone(&self.exchange_handlers),
            char_coding: Arc::clone(&self.char_coding),
            h2: Arc::clone(&self.h2),
            connection_listener: Arc::new(LoggingConnectionListener::new(
                id.clone(),
                Arc::clone(&self.sink),
            )),
            stream_listener: Arc::new(LoggingStreamListener::new(id.clone(), Arc::clone(&self.sink))),
            session_wrapper: self.multiplexer_wrapper(&id),
        });

        Ok(Box::new(LoggingEventHandler::new(
            negotiator,
            id,
            Arc::clone(&self.sink),
        )))
    }
}

/// Builder for `ServerHandlerFactory`. Processor and exchange handlers are required.
#[derive(Default)]
pub struct ServerHandlerFactoryBuilder {
    processor: Option<Arc<dyn HttpProcessor>>,
    exchange_handlers: Option<Arc<dyn ExchangeHandlerFactory>>,
    char_coding: CharCodingConfig,
    h2: H2Config,
    security_context: Option<SecurityContext>,
    negotiator_factory: Option<Arc<dyn NegotiatorFactory>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    id_prefix: Option<Arc<str>>,
    trace_transport: bool,
}

impl ServerHandlerFactoryBuilder {
    /// Take protocol tuning, character coding and diagnostics from `config`.
    pub fn server_config(self, config: &ServerConfig) -> Self {
        self.h2_config(config.h2.clone())
            .char_coding(config.char_coding)
            .id_prefix(config.observability.connection_id_prefix.as_str())
            .trace_transport(config.observability.trace_transport)
    }

    pub fn processor(mut self, processor: Arc<dyn HttpProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn exchange_handlers(mut self, handlers: Arc<dyn ExchangeHandlerFactory>) -> Self {
        self.exchange_handlers = Some(handlers);
        self
    }

    pub fn char_coding(mut self, char_coding: CharCodingConfig) -> Self {
        self.char_coding = char_coding;
        self
    }

    pub fn h2_config(mut self, h2: H2Config) -> Self {
        self.h2 = h2;
        self
    }

    /// Upgrade every connection to TLS with `context`.
    pub fn security_context(mut self, context: SecurityContext) -> Self {
        self.security_context = Some(context);
        self
    }

    pub fn negotiator_factory(mut self, factory: Arc<dyn NegotiatorFactory>) -> Self {
        self.negotiator_factory = Some(factory);
        self
    }

    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Also decorate the raw transport session, before negotiation.
    pub fn trace_transport(mut self, enabled: bool) -> Self {
        self.trace_transport = enabled;
        self
    }

    pub fn build(self) -> Result<ServerHandlerFactory, ConfigError> {
        let processor = self
            .processor
            .ok_or(ConfigError::MissingCollaborator("HTTP processor"))?;
        let exchange_handlers = self
            .exchange_handlers
            .ok_or(ConfigError::MissingCollaborator("exchange handler factory"))?;

        Ok(ServerHandlerFactory {
            processor,
            exchange_handlers,
            char_coding: Arc::new(self.char_coding),
            h2: Arc::new(self.h2),
            security_context: self.security_context,
            negotiator_factory: self
                .negotiator_factory
                .unwrap_or_else(|| Arc::new(H2NegotiatorFactory)),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            id_prefix: self
                .id_prefix
                .unwrap_or_else(|| Arc::from(DEFAULT_CONNECTION_PREFIX)),
            trace_transport: self.trace_transport,
        })
    }
}
