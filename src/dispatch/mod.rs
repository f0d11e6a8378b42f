//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! framed Request (head only)
//!     → admit(): transfer-encoding / content-length sanity
//!                → route (404) → auth (401 + challenge)
//!                → body-less method guard (400) → body limit (400)
//!     → [connection reads exactly Content-Length body bytes]
//!     → invoke(): handler on a blocking worker (500 on error or panic)
//!     → finish(): id, version, Server/Date, Connection: close, HEAD
//! ```
//!
//! # Design Decisions
//! - Admission is synchronous and runs on the connection's read task, so
//!   the body is only read for requests that will reach a handler
//! - Every path, including rejections, ends in `finish()`

pub mod defaults;
pub mod error;

use std::time::Instant;

use http::StatusCode;

use crate::auth::{AuthOutcome, Authenticator, Principal};
use crate::http::{Method, Request, RequestId, Response, Version};
use crate::observability::metrics;
use crate::routing::{content_type_for, HandlerDescriptor, Route, Router, StaticResource};

pub use defaults::{http_date, DefaultHeaders};
pub use error::DispatchError;

/// A request that passed every pre-invocation check.
#[derive(Debug, Clone)]
pub struct Admission {
    route: Route,
    principal: Option<Principal>,
    body_len: u64,
}

impl Admission {
    /// Exact number of body bytes to read before invocation.
    pub fn body_len(&self) -> u64 {
        self.body_len
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Router,
    authenticator: Authenticator,
    defaults: DefaultHeaders,
    max_content_length: u64,
}

impl Dispatcher {
    pub fn new(
        router: Router,
        authenticator: Authenticator,
        defaults: DefaultHeaders,
        max_content_length: u64,
    ) -> Self {
        Self {
            router,
            authenticator,
            defaults,
            max_content_length,
        }
    }

    pub fn max_content_length(&self) -> u64 {
        self.max_content_length
    }

    /// Run every check that must pass before the body is read and the
    /// handler invoked.
    pub fn admit(&self, request: &Request) -> Result<Admission, DispatchError> {
        let headers = request.headers();

        if let Some(coding) = headers.joined("transfer-encoding") {
            return Err(DispatchError::UnsupportedTransferEncoding(coding));
        }
        let declared = headers
            .content_length()
            .map_err(|e| DispatchError::InvalidContentLength(e.0))?;

        let route = self
            .router
            .resolve(request.method(), request.path())
            .map_err(|e| DispatchError::RouteNotFound {
                method: e.method,
                path: e.path,
            })?;

        let principal = match &route {
            Route::Endpoint(descriptor) if descriptor.requires_auth() => {
                let authorization = headers.joined("authorization");
                match self
                    .authenticator
                    .authorize(descriptor.auth_schemes(), authorization.as_deref())
                {
                    AuthOutcome::Authorized(principal) => Some(principal),
                    AuthOutcome::Unauthorized(challenge) => {
                        return Err(DispatchError::Unauthorized { challenge })
                    }
                }
            }
            _ => None,
        };

        let method = request.method();
        let body_len = if method.is_bodyless() {
            if let Some(header) = headers.names().find(|name| name.starts_with("content-")) {
                return Err(DispatchError::UnexpectedContent {
                    method,
                    header: header.to_string(),
                });
            }
            0
        } else {
            declared.unwrap_or(0)
        };

        if body_len > self.max_content_length {
            return Err(DispatchError::BodyTooLarge {
                declared: body_len,
                limit: self.max_content_length,
            });
        }

        Ok(Admission {
            route,
            principal,
            body_len,
        })
    }

    /// Produce the response for an admitted request whose body (if any) is
    /// already attached.
    pub async fn invoke(&self, request: Request, admission: Admission) -> Response {
        let started = Instant::now();
        let id = request.id();
        let version = request.version();
        let method = request.method();
        let close = request.wants_close();

        let response = match admission.route {
            Route::Static(resource) => static_response(&resource),
            Route::Endpoint(descriptor) => {
                self.call(descriptor, request.with_principal(admission.principal))
                    .await
            }
        };

        metrics::record_latency(method, started);
        self.finish(response, id, version, method, close)
    }

    async fn call(&self, descriptor: HandlerDescriptor, request: Request) -> Response {
        let handler = descriptor.handler();
        let request_id = request.id();

        let failure = match tokio::task::spawn_blocking(move || handler.handle(&request)).await {
            Ok(Ok(mut response)) => {
                if let Some(status) = descriptor.status_override() {
                    response.set_status(status);
                }
                return response;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join) if join.is_panic() => "handler panicked".to_string(),
            Err(_) => "handler task was cancelled".to_string(),
        };

        tracing::warn!(
            request_id = %request_id,
            handler = descriptor.name(),
            reason = %failure,
            "Handler invocation failed"
        );
        error_response(&DispatchError::HandlerInvocation {
            handler: descriptor.name().to_string(),
            reason: failure,
        })
    }

    /// Admit and invoke in one step. The request must already carry its body.
    pub async fn dispatch(&self, request: Request) -> Response {
        match self.admit(&request) {
            Ok(admission) => {
                let attached = request.body().map(|b| b.len() as u64).unwrap_or(0);
                if attached != admission.body_len() {
                    let error = DispatchError::BodyRead(format!(
                        "expected {} body bytes, got {attached}",
                        admission.body_len()
                    ));
                    return self.reject(&request, &error, true);
                }
                self.invoke(request, admission).await
            }
            Err(error) => self.reject(&request, &error, false),
        }
    }

    /// Synthesized response for a request that failed before (or instead of)
    /// reaching its handler.
    pub fn reject(&self, request: &Request, error: &DispatchError, close: bool) -> Response {
        self.finish(
            error_response(error),
            request.id(),
            request.version(),
            request.method(),
            close || error.is_terminal(),
        )
    }

    /// Terminal response for a request that could not be framed.
    pub fn framing_rejection(&self, id: RequestId, status: StatusCode) -> Response {
        self.finish(Response::new(status), id, Version::Http11, Method::Get, true)
    }

    fn finish(
        &self,
        mut response: Response,
        id: RequestId,
        version: Version,
        method: Method,
        close: bool,
    ) -> Response {
        response.set_id(id);
        response.set_version(version);
        self.defaults.apply(&mut response);
        if close {
            response.headers_mut().insert("connection", "close");
        }
        metrics::record_response(method, response.status());
        if method == Method::Head {
            response.without_body()
        } else {
            response
        }
    }
}

fn error_response(error: &DispatchError) -> Response {
    let response = Response::new(error.status());
    match error {
        DispatchError::Unauthorized { challenge } => {
            response.with_header("www-authenticate", challenge.clone())
        }
        _ => response,
    }
}

fn static_response(resource: &StaticResource) -> Response {
    Response::ok()
        .with_file(content_type_for(&resource.location), resource.location.clone())
        .with_header("last-modified", resource.last_modified.clone())
        .with_header("etag", resource.etag.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::auth::{AuthScheme, StaticCredentials};
    use crate::http::{Content, Headers};
    use crate::routing::{Endpoints, HandlerError, StaticFiles};

    struct Fixture {
        dispatcher: Dispatcher,
        calls: Arc<AtomicUsize>,
    }

    fn fixture_with_statics(statics: Option<StaticFiles>) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut endpoints = Endpoints::new();

        let counter = Arc::clone(&calls);
        endpoints
            .route(Method::Get, "/hello", move |req: &Request| -> Result<Response, HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Response::for_request(req, StatusCode::OK).with_text("text/plain", "hi"))
            })
            .unwrap();

        let counter = Arc::clone(&calls);
        endpoints
            .route(Method::Post, "/echo", move |req: &Request| -> Result<Response, HandlerError> {
                counter.fetch_add(1, Ordering::SeqCst);
                let body = req.body().cloned().unwrap_or_default();
                Ok(Response::ok().with_bytes("application/octet-stream", body))
            })
            .unwrap();

        endpoints
            .route(Method::Get, "/fails", |_: &Request| -> Result<Response, HandlerError> {
                Err(HandlerError::new("database unavailable"))
            })
            .unwrap();

        endpoints
            .route(Method::Get, "/panics", |_: &Request| -> Result<Response, HandlerError> {
                panic!("handler bug")
            })
            .unwrap();

        endpoints
            .register(
                Method::Post,
                "/created",
                HandlerDescriptor::new("created", |_: &Request| -> Result<Response, HandlerError> {
                    Ok(Response::ok())
                })
                .with_status(StatusCode::CREATED),
            )
            .unwrap();

        endpoints
            .register(
                Method::Get,
                "/me",
                HandlerDescriptor::new("me", |req: &Request| -> Result<Response, HandlerError> {
                    let name = req.principal().map(|p| p.name().to_string()).unwrap_or_default();
                    Ok(Response::ok().with_text("text/plain", name))
                })
                .authenticated([AuthScheme::bearer("api")]),
            )
            .unwrap();

        let mut router = Router::new(Arc::new(endpoints));
        if let Some(statics) = statics {
            router = router.with_statics(Arc::new(statics));
        }
        let authenticator = Authenticator::new(
            Arc::new(StaticCredentials::new().with_token("good", "svc")),
            "nexus",
        );

        Fixture {
            dispatcher: Dispatcher::new(router, authenticator, DefaultHeaders::new("test"), 16),
            calls,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_statics(None)
    }

    fn request(method: Method, target: &str, headers: &[(&str, &str)]) -> Request {
        let mut h = Headers::new();
        for (name, value) in headers {
            h.append(name, *value);
        }
        Request::new(RequestId::new(7), method, target, Version::Http11, h)
    }

    #[tokio::test]
    async fn invokes_handler_and_stamps_defaults() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Get, "/hello?x=1", &[])).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.id(), RequestId::new(7));
        assert_eq!(res.headers().first("server"), Some("test"));
        assert!(res.headers().contains("date"));
        assert!(!res.closes_connection());
        assert_eq!(res.content(), &Content::Text("hi".into()));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Get, "/nope", &[])).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().contains("server"));
        assert!(res.headers().contains("date"));
    }

    #[tokio::test]
    async fn missing_authorization_gets_realm_challenge() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Get, "/me", &[])).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            res.headers().first("www-authenticate"),
            Some(r#"Bearer realm="api""#)
        );
    }

    #[tokio::test]
    async fn bad_token_gets_error_challenge_and_handler_not_run() {
        let f = fixture();
        let res = f
            .dispatcher
            .dispatch(request(Method::Get, "/me", &[("authorization", "Bearer wrong")]))
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            res.headers().first("www-authenticate"),
            Some(r#"Bearer error="invalid_token", realm="api""#)
        );
    }

    #[tokio::test]
    async fn principal_reaches_handler() {
        let f = fixture();
        let res = f
            .dispatcher
            .dispatch(request(Method::Get, "/me", &[("authorization", "Bearer good")]))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.content(), &Content::Text("svc".into()));
    }

    #[tokio::test]
    async fn bodyless_method_with_content_header_is_400() {
        let f = fixture();
        let req = request(Method::Get, "/hello", &[("Content-Type", "text/plain")]);
        let err = f.dispatcher.admit(&req).unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnexpectedContent {
                method: Method::Get,
                header: "content-type".into()
            }
        );
        let res = f.dispatcher.dispatch(req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_400_and_terminal() {
        let f = fixture();
        let req = request(Method::Post, "/echo", &[("content-length", "17")]);
        let err = f.dispatcher.admit(&req).unwrap_err();
        assert_eq!(
            err,
            DispatchError::BodyTooLarge {
                declared: 17,
                limit: 16
            }
        );
        let res = f.dispatcher.reject(&req, &err, false);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.closes_connection());
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn body_within_limit_is_admitted() {
        let f = fixture();
        let req = request(Method::Post, "/echo", &[("content-length", "5")]);
        let admission = f.dispatcher.admit(&req).unwrap();
        assert_eq!(admission.body_len(), 5);

        let res = f.dispatcher.invoke(req.with_body(&b"hello"[..]), admission).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.content(), &Content::Bytes(bytes::Bytes::from_static(b"hello")));
    }

    #[tokio::test]
    async fn chunked_is_not_implemented() {
        let f = fixture();
        let req = request(Method::Post, "/echo", &[("transfer-encoding", "chunked")]);
        let res = f.dispatcher.dispatch(req).await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(res.closes_connection());
    }

    #[tokio::test]
    async fn handler_error_and_panic_are_500() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Get, "/fails", &[])).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = f.dispatcher.dispatch(request(Method::Get, "/panics", &[])).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().contains("date"));
    }

    #[tokio::test]
    async fn status_override_applies() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Post, "/created", &[])).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn head_on_get_only_route_is_404() {
        let f = fixture();
        let res = f.dispatcher.dispatch(request(Method::Head, "/hello", &[])).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_resource_passes_validators_through() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"body { }").unwrap();

        let mut statics = StaticFiles::new();
        statics.insert(
            "/site.css",
            StaticResource {
                location: file.path().to_path_buf(),
                last_modified: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
                etag: "\"v1\"".into(),
            },
        );
        let f = fixture_with_statics(Some(statics));

        let res = f.dispatcher.dispatch(request(Method::Get, "/site.css", &[])).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().first("etag"), Some("\"v1\""));
        assert_eq!(
            res.headers().first("last-modified"),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );
        assert_eq!(res.content(), &Content::File(file.path().to_path_buf()));
    }

    #[tokio::test]
    async fn connection_close_is_echoed() {
        let f = fixture();
        let res = f
            .dispatcher
            .dispatch(request(Method::Get, "/hello", &[("connection", "close")]))
            .await;
        assert!(res.closes_connection());
    }

    #[test]
    fn framing_rejection_closes() {
        let f = fixture();
        let res = f
            .dispatcher
            .framing_rejection(RequestId::new(3), StatusCode::BAD_REQUEST);
        assert_eq!(res.id(), RequestId::new(3));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.closes_connection());
        assert!(res.headers().contains("server"));
    }
}
