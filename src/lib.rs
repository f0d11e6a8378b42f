//! Nexus HTTP: an HTTP/1.1 server engine built directly on Tokio sockets.

// Core subsystems
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::{HttpServer, Request, Response, ServerError};
pub use lifecycle::Shutdown;
pub use routing::{Endpoints, HandlerDescriptor, HandlerError};
