//! `WWW-Authenticate` challenge rendering.

use std::fmt;

/// RFC 6750 error codes for the Bearer scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BearerError {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
}

impl BearerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            BearerError::InvalidRequest => "invalid_request",
            BearerError::InvalidToken => "invalid_token",
            BearerError::InsufficientScope => "insufficient_scope",
        }
    }
}

/// `Basic realm="<realm>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicChallenge {
    realm: String,
}

impl BasicChallenge {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn render(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}

/// Bearer challenge builder.
///
/// Renders `Bearer`, then `error="…"` when an error is set, then the realm
/// (always), then `scope`, `error-description` and `error-uri` when set,
/// comma-separated in that order. Setting both an error and a realm renders
/// both; no validity check is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    realm: String,
    error: Option<BearerError>,
    scope: Option<String>,
    error_description: Option<String>,
    error_uri: Option<String>,
}

impl BearerChallenge {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            error: None,
            scope: None,
            error_description: None,
            error_uri: None,
        }
    }

    pub fn with_error(mut self, error: BearerError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    pub fn with_error_uri(mut self, uri: impl Into<String>) -> Self {
        self.error_uri = Some(uri.into());
        self
    }

    pub fn error(&self) -> Option<BearerError> {
        self.error
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Bearer ");
        if let Some(error) = self.error {
            out.push_str("error=\"");
            out.push_str(error.as_str());
            out.push_str("\", ");
        }
        out.push_str("realm=\"");
        out.push_str(&self.realm);
        out.push('"');

        for (key, value) in [
            ("scope", &self.scope),
            ("error-description", &self.error_description),
            ("error-uri", &self.error_uri),
        ] {
            if let Some(value) = value {
                out.push_str(", ");
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic(BasicChallenge),
    Bearer(BearerChallenge),
}

impl Challenge {
    pub fn render(&self) -> String {
        match self {
            Challenge::Basic(c) => c.render(),
            Challenge::Bearer(c) => c.render(),
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bearer_realm_only() {
        assert_eq!(BearerChallenge::new("api").render(), r#"Bearer realm="api""#);
    }

    #[test]
    fn bearer_error_then_realm() {
        let c = BearerChallenge::new("api").with_error(BearerError::InvalidToken);
        assert_eq!(c.render(), r#"Bearer error="invalid_token", realm="api""#);
    }

    #[test]
    fn bearer_optional_fields_in_order() {
        let c = BearerChallenge::new("example")
            .with_error_uri("https://example.com/errors")
            .with_error_description("The access token expired")
            .with_scope("read write")
            .with_error(BearerError::InsufficientScope);
        assert_eq!(
            c.render(),
            r#"Bearer error="insufficient_scope", realm="example", scope="read write", error-description="The access token expired", error-uri="https://example.com/errors""#
        );
    }

    #[test]
    fn basic_challenge() {
        let c = Challenge::Basic(BasicChallenge::new("Hello, world!"));
        assert_eq!(c.to_string(), r#"Basic realm="Hello, world!""#);
    }
}
