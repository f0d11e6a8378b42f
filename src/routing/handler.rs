//! Handler boundary and the descriptors that locate handlers.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::auth::AuthScheme;
use crate::http::{Request, Response};

/// Application code answering one request.
///
/// Handlers run on the worker pool and may block; they receive the framed
/// request (body and principal already attached) and return one response.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        self(request)
    }
}

/// A handler failed to produce a response. Reported to the client as 500.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Result of route resolution: which handler, and under what conditions.
///
/// Immutable once registered.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    handler: Arc<dyn Handler>,
    auth: Option<Vec<AuthScheme>>,
    status_override: Option<StatusCode>,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            auth: None,
            status_override: None,
        }
    }

    /// Require authentication with any of `schemes`. An empty list means
    /// Basic with the server's default realm.
    pub fn authenticated(mut self, schemes: impl IntoIterator<Item = AuthScheme>) -> Self {
        self.auth = Some(schemes.into_iter().collect());
        self
    }

    /// Replace the status of the handler's response.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_override = Some(status);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }

    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }

    pub fn auth_schemes(&self) -> &[AuthScheme] {
        self.auth.as_deref().unwrap_or(&[])
    }

    pub fn status_override(&self) -> Option<StatusCode> {
        self.status_override
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("auth", &self.auth)
            .field("status_override", &self.status_override)
            .finish_non_exhaustive()
    }
}
