//! `Authorization` header parsing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::SchemeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("unsupported authorization scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("malformed {0:?} credentials")]
    Malformed(SchemeKind),
}

impl Credentials {
    /// Parse an `Authorization` header value. Scheme names are
    /// case-insensitive.
    pub fn parse(header: &str) -> Result<Self, CredentialsError> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(' ').unwrap_or((header, ""));
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            Self::parse_basic(rest).ok_or(CredentialsError::Malformed(SchemeKind::Basic))
        } else if scheme.eq_ignore_ascii_case("bearer") {
            if is_b64token(rest) {
                Ok(Credentials::Bearer {
                    token: rest.to_string(),
                })
            } else {
                Err(CredentialsError::Malformed(SchemeKind::Bearer))
            }
        } else {
            Err(CredentialsError::UnsupportedScheme(scheme.to_string()))
        }
    }

    fn parse_basic(encoded: &str) -> Option<Self> {
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn scheme(&self) -> SchemeKind {
        match self {
            Credentials::Basic { .. } => SchemeKind::Basic,
            Credentials::Bearer { .. } => SchemeKind::Bearer,
        }
    }
}

/// RFC 6750 `b64token`: `1*( ALPHA / DIGIT / "-" / "." / "_" / "~" / "+" / "/" ) *"="`
fn is_b64token(token: &str) -> bool {
    let body = token.trim_end_matches('=');
    !body.is_empty()
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'+' | b'/'))
}
