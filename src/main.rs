//! Nexus HTTP server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                     CONNECTION                           │
//!   Client bytes  │  ┌─────────┐   ┌──────────┐   ┌──────────┐              │
//!   ──────────────┼─▶│listener │──▶│  framer  │──▶│dispatcher│──┐           │
//!                 │  └─────────┘   └──────────┘   │ route    │  │           │
//!                 │                               │ auth     │  ▼           │
//!                 │                               └──────────┘ ┌──────────┐ │
//!                 │                                            │  worker  │ │
//!                 │                                            │   pool   │ │
//!                 │                                            └────┬─────┘ │
//!   Responses     │                ┌───────────┐                    │       │
//!   ◀─────────────┼────────────────│ sequencer │◀───────────────────┘       │
//!                 │                │ (ordered) │                            │
//!                 │                └───────────┘                            │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use nexus_http::auth::AuthScheme;
use nexus_http::config::{load_config, ServerConfig};
use nexus_http::http::{Method, Request, Response, StatusCode};
use nexus_http::lifecycle::shutdown_signal;
use nexus_http::net::Listener;
use nexus_http::observability::{init_logging, init_metrics};
use nexus_http::routing::{DuplicateEndpoint, Endpoints, HandlerDescriptor, HandlerError};
use nexus_http::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "nexus-http", version, about = "HTTP/1.1 server engine")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nexus-http starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_content_length = config.limits.max_content_length,
        idle_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::builder(config)
        .endpoints(demo_endpoints()?)
        .build()?;

    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// A few endpoints to poke at the engine with curl.
fn demo_endpoints() -> Result<Endpoints, DuplicateEndpoint> {
    let mut endpoints = Endpoints::new();

    endpoints.route(Method::Get, "/", |req: &Request| -> Result<Response, HandlerError> {
        Ok(Response::for_request(req, StatusCode::OK)
            .with_text("text/plain; charset=utf-8", "nexus-http is running\n"))
    })?;

    endpoints.route(Method::Post, "/echo", |req: &Request| -> Result<Response, HandlerError> {
        let content_type = req
            .header("content-type")
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = req.body().cloned().unwrap_or_default();
        Ok(Response::ok().with_bytes(&content_type, body))
    })?;

    endpoints.register(
        Method::Get,
        "/secure",
        HandlerDescriptor::new("secure", |req: &Request| -> Result<Response, HandlerError> {
            let name = req.principal().map(|p| p.name()).unwrap_or("anonymous");
            Ok(Response::ok().with_text("text/plain; charset=utf-8", format!("hello, {name}\n")))
        })
        .authenticated([AuthScheme::basic("nexus")]),
    )?;

    endpoints.register(
        Method::Get,
        "/whoami",
        HandlerDescriptor::new("whoami", |req: &Request| -> Result<Response, HandlerError> {
            let name = req.principal().map(|p| p.name()).unwrap_or("anonymous");
            Ok(Response::ok().with_text("text/plain; charset=utf-8", format!("{name}\n")))
        })
        .authenticated([AuthScheme::bearer("api")]),
    )?;

    endpoints.register(
        Method::Put,
        "/items",
        HandlerDescriptor::new("create-item", |req: &Request| -> Result<Response, HandlerError> {
            let len = req.body().map(|b| b.len()).unwrap_or(0);
            Ok(Response::ok().with_text("text/plain; charset=utf-8", format!("stored {len} bytes\n")))
        })
        .with_status(StatusCode::CREATED),
    )?;

    endpoints.route(Method::Options, "/items", |req: &Request| -> Result<Response, HandlerError> {
        let mut response = Response::new(StatusCode::NO_CONTENT).with_header("allow", "PUT, OPTIONS");
        if req.access_control_request_method() == Some(Method::Put) {
            let mut headers: Vec<String> = req
                .access_control_request_headers()
                .unwrap_or_default()
                .into_iter()
                .collect();
            headers.sort();
            response = response
                .with_header("access-control-allow-methods", "PUT, OPTIONS")
                .with_header("access-control-allow-headers", headers.join(", "));
        }
        Ok(response)
    })?;

    Ok(endpoints)
}
