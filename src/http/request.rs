//! Framed requests and their per-connection identity.
//!
//! # Responsibilities
//! - Assign each framed request a connection-local, monotonically increasing id
//! - Hold the request line, header multimap and optional body
//! - Expose routing-relevant views (path, query) of the raw target
//! - Expose the CORS preflight fields of `OPTIONS` requests
//!
//! # Design Decisions
//! - Ids wrap to zero at `u64::MAX` instead of overflowing
//! - A request is immutable once handed to a handler; the dispatcher only
//!   attaches the body and the authenticated principal before that point

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;

use crate::auth::Principal;
use crate::http::{Headers, Method, Version};

/// Connection-local request identifier. The response answering a request
/// carries the same id, so ordering on the wire is numeric ordering of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RequestId(u64);

impl RequestId {
    pub const ZERO: RequestId = RequestId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id following this one, wrapping to zero at the numeric ceiling.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
    body: Option<Bytes>,
    principal: Option<Principal>,
}

impl Request {
    pub fn new(
        id: RequestId,
        method: Method,
        target: impl Into<String>,
        version: Version,
        headers: Headers,
    ) -> Self {
        Self {
            id,
            method,
            target: target.into(),
            version,
            headers,
            body: None,
            principal: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub(crate) fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The request target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Target up to (not including) the first `?`.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The principal established by authentication, if the endpoint required it.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// `Access-Control-Request-Method` of a CORS preflight. `None` unless
    /// this is an `OPTIONS` request carrying a recognised method.
    pub fn access_control_request_method(&self) -> Option<Method> {
        if self.method != Method::Options {
            return None;
        }
        self.headers
            .first("access-control-request-method")?
            .trim()
            .parse()
            .ok()
    }

    /// `Access-Control-Request-Headers` of a CORS preflight, lowercased.
    pub fn access_control_request_headers(&self) -> Option<HashSet<String>> {
        if self.method != Method::Options {
            return None;
        }
        let names: HashSet<String> = self
            .headers
            .get("access-control-request-headers")?
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Some(names)
    }

    /// Whether the connection should close once this request is answered.
    pub fn wants_close(&self) -> bool {
        match self.version {
            Version::Http11 => self.headers.has_token("connection", "close"),
            Version::Http10 => !self.headers.has_token("connection", "keep-alive"),
        }
    }
}
