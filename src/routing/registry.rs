//! Endpoint registry.
//!
//! # Responsibilities
//! - Map `(method, path)` to a handler descriptor
//! - Reject duplicate registrations at startup
//!
//! # Design Decisions
//! - Populated before the listener starts, read-only afterwards
//! - Exact-string path match, no wildcards or segment captures

use std::collections::HashMap;

use crate::http::Method;
use crate::routing::{Handler, HandlerDescriptor};

/// Read-only endpoint lookup consumed by the router.
pub trait EndpointRegistry: Send + Sync {
    fn lookup(&self, method: Method, path: &str) -> Option<&HandlerDescriptor>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("endpoint {method} {path} registered twice")]
pub struct DuplicateEndpoint {
    pub method: Method,
    pub path: String,
}

/// In-memory registry.
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    map: HashMap<(Method, String), HandlerDescriptor>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        method: Method,
        path: impl Into<String>,
        descriptor: HandlerDescriptor,
    ) -> Result<(), DuplicateEndpoint> {
        let path = path.into();
        if self.map.contains_key(&(method, path.clone())) {
            return Err(DuplicateEndpoint { method, path });
        }
        tracing::debug!(%method, path = %path, handler = descriptor.name(), "Endpoint registered");
        self.map.insert((method, path), descriptor);
        Ok(())
    }

    /// Register a plain handler, named after its route.
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
    ) -> Result<(), DuplicateEndpoint> {
        self.register(
            method,
            path,
            HandlerDescriptor::new(format!("{method} {path}"), handler),
        )
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl EndpointRegistry for Endpoints {
    fn lookup(&self, method: Method, path: &str) -> Option<&HandlerDescriptor> {
        self.map.get(&(method, path.to_string()))
    }
}
