//! HTTP/2 incoming-connection server
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌───────────────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ net::listener ─▶ http::server (one task per connection)  │
//!                           │                          │                                │
//!                           │                          ▼                                │
//!                           │   handler::factory  (connection ID, TLS, listeners)       │
//!                           │                          │                                │
//!                           │                          ▼                                │
//!                           │   LoggingEventHandler ─▶ negotiator ─▶ multiplexer        │
//!                           │                                          │                │
//!                           │                                          ▼                │
//!     ◀─────────────────────┼──────────────── processor ─▶ exchange handler             │
//!                           │                                                           │
//!                           │   config · observability · lifecycle                     │
//!                           └───────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use h2_incoming::config::load_with_overrides;
use h2_incoming::http::{EchoHandler, H2Server, PrefixHandlerFactory, StandardProcessor};
use h2_incoming::lifecycle::Shutdown;
use h2_incoming::net::listener::Listener;
use h2_incoming::net::tls::SecurityContext;
use h2_incoming::observability::{init_logging, metrics};
use h2_incoming::ServerHandlerFactory;

#[derive(Debug, Parser)]
#[command(name = "h2-incoming", version, about = "Instrumented HTTP/2 server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_with_overrides(cli.config.as_deref(), cli.bind)?;

    init_logging(&config.observability.log_filter);
    tracing::info!("h2-incoming v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_concurrent_streams = config.h2.max_concurrent_streams,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let handlers = PrefixHandlerFactory::new().register("/", Arc::new(EchoHandler));
    let mut builder = ServerHandlerFactory::builder()
        .server_config(&config)
        .processor(Arc::new(StandardProcessor::default()))
        .exchange_handlers(Arc::new(handlers));
    if let Some(tls) = &config.listener.tls {
        let context = SecurityContext::from_pem_files(Path::new(&tls.cert_path), Path::new(&tls.key_path))?;
        builder = builder.security_context(context);
    }
    let factory = builder.build()?;

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = H2Server::new(Arc::new(factory), &config.shutdown);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
