//! Headers stamped on every outgoing response.

use chrono::{DateTime, Utc};

use crate::http::Response;

/// `Server` and `Date`, added to every response including synthesized
/// error responses.
#[derive(Debug, Clone)]
pub struct DefaultHeaders {
    server: String,
}

impl DefaultHeaders {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert_if_absent("server", self.server.clone());
        headers.insert_if_absent("date", http_date(Utc::now()));
    }
}

impl Default for DefaultHeaders {
    fn default() -> Self {
        Self::new(concat!("nexus-http/", env!("CARGO_PKG_VERSION")))
    }
}

/// RFC 1123 date in GMT, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
