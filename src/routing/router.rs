//! Route resolution.
//!
//! # Responsibilities
//! - Resolve `(method, path)` against the endpoint registry
//! - Fall back to the static resource registry for GET/HEAD
//! - Return a resolved route or an explicit not-found
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - Endpoints win over static resources on the same path

use std::sync::Arc;

use crate::http::Method;
use crate::routing::{EndpointRegistry, HandlerDescriptor, StaticResource, StaticResourceRegistry};

#[derive(Debug, Clone)]
pub enum Route {
    Endpoint(HandlerDescriptor),
    Static(StaticResource),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route for {method} {path}")]
pub struct RouteNotFound {
    pub method: Method,
    pub path: String,
}

#[derive(Clone)]
pub struct Router {
    endpoints: Arc<dyn EndpointRegistry>,
    statics: Option<Arc<dyn StaticResourceRegistry>>,
}

impl Router {
    pub fn new(endpoints: Arc<dyn EndpointRegistry>) -> Self {
        Self {
            endpoints,
            statics: None,
        }
    }

    pub fn with_statics(mut self, statics: Arc<dyn StaticResourceRegistry>) -> Self {
        self.statics = Some(statics);
        self
    }

    pub fn resolve(&self, method: Method, path: &str) -> Result<Route, RouteNotFound> {
        if let Some(descriptor) = self.endpoints.lookup(method, path) {
            return Ok(Route::Endpoint(descriptor.clone()));
        }

        if matches!(method, Method::Get | Method::Head) {
            if let Some(resource) = self.statics.as_ref().and_then(|s| s.lookup(path)) {
                return Ok(Route::Static(resource.clone()));
            }
        }

        Err(RouteNotFound {
            method,
            path: path.to_string(),
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("statics", &self.statics.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::routing::{Endpoints, HandlerError, StaticFiles};

    fn router() -> Router {
        let mut endpoints = Endpoints::new();
        endpoints
            .route(Method::Get, "/", |_: &Request| -> Result<Response, HandlerError> {
                Ok(Response::ok())
            })
            .unwrap();

        let mut statics = StaticFiles::new();
        statics.insert(
            "/",
            StaticResource {
                location: "/srv/index.html".into(),
                last_modified: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
                etag: "\"root\"".into(),
            },
        );
        statics.insert(
            "/style.css",
            StaticResource {
                location: "/srv/style.css".into(),
                last_modified: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
                etag: "\"css\"".into(),
            },
        );

        Router::new(Arc::new(endpoints)).with_statics(Arc::new(statics))
    }

    #[test]
    fn endpoint_wins_over_static() {
        assert!(matches!(router().resolve(Method::Get, "/"), Ok(Route::Endpoint(_))));
    }

    #[test]
    fn static_only_for_get_and_head() {
        let r = router();
        assert!(matches!(r.resolve(Method::Get, "/style.css"), Ok(Route::Static(_))));
        assert!(matches!(r.resolve(Method::Head, "/style.css"), Ok(Route::Static(_))));
        assert_eq!(
            r.resolve(Method::Post, "/style.css").unwrap_err(),
            RouteNotFound {
                method: Method::Post,
                path: "/style.css".into()
            }
        );
    }

    #[test]
    fn unknown_path() {
        assert!(router().resolve(Method::Get, "/missing").is_err());
    }
}
