//! Authentication challenge negotiation.
//!
//! # Data Flow
//! ```text
//! endpoint requires auth?
//!     → Authorization header absent   → realm-only challenge per accepted scheme
//!     → credentials.rs (parse Basic / Bearer)
//!         malformed                   → scheme challenge (Bearer: invalid_request)
//!     → validator.rs (external check)
//!         rejected                    → scheme challenge (Bearer: invalid_token)
//!         accepted                    → Authorized(principal)
//! ```
//!
//! # Design Decisions
//! - Pure functions over the descriptor's accepted schemes; no state
//! - Multiple challenges share one `WWW-Authenticate` value, comma-joined
//! - Credential checking is delegated; this module only builds/parses headers

pub mod challenge;
pub mod credentials;
pub mod validator;

use std::sync::Arc;

pub use challenge::{BasicChallenge, BearerChallenge, BearerError, Challenge};
pub use credentials::{Credentials, CredentialsError};
pub use validator::{CredentialValidator, DenyAll, StaticCredentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    Basic,
    Bearer,
}

/// A scheme an endpoint accepts, with the realm it advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic { realm: String },
    Bearer { realm: String, scope: Option<String> },
}

impl AuthScheme {
    pub fn basic(realm: impl Into<String>) -> Self {
        AuthScheme::Basic {
            realm: realm.into(),
        }
    }

    pub fn bearer(realm: impl Into<String>) -> Self {
        AuthScheme::Bearer {
            realm: realm.into(),
            scope: None,
        }
    }

    pub fn kind(&self) -> SchemeKind {
        match self {
            AuthScheme::Basic { .. } => SchemeKind::Basic,
            AuthScheme::Bearer { .. } => SchemeKind::Bearer,
        }
    }

    /// Challenge for this scheme. `error` only applies to Bearer.
    pub fn challenge(&self, error: Option<BearerError>) -> Challenge {
        match self {
            AuthScheme::Basic { realm } => Challenge::Basic(BasicChallenge::new(realm.clone())),
            AuthScheme::Bearer { realm, scope } => {
                let mut c = BearerChallenge::new(realm.clone());
                if let Some(error) = error {
                    c = c.with_error(error);
                }
                if let Some(scope) = scope {
                    c = c.with_scope(scope.clone());
                }
                Challenge::Bearer(c)
            }
        }
    }
}

/// The identity established by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
    scheme: SchemeKind,
}

impl Principal {
    pub fn new(name: impl Into<String>, scheme: SchemeKind) -> Self {
        Self {
            name: name.into(),
            scheme,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheme(&self) -> SchemeKind {
        self.scheme
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized(Principal),
    /// Carries the `WWW-Authenticate` value to send with the 401.
    Unauthorized(String),
}

#[derive(Clone)]
pub struct Authenticator {
    validator: Arc<dyn CredentialValidator>,
    default_realm: String,
}

impl Authenticator {
    pub fn new(validator: Arc<dyn CredentialValidator>, default_realm: impl Into<String>) -> Self {
        Self {
            validator,
            default_realm: default_realm.into(),
        }
    }

    /// Check the request's `Authorization` value against the schemes an
    /// endpoint accepts. An empty scheme list means Basic with the default realm.
    pub fn authorize(&self, schemes: &[AuthScheme], authorization: Option<&str>) -> AuthOutcome {
        let fallback;
        let schemes = if schemes.is_empty() {
            fallback = [AuthScheme::basic(self.default_realm.clone())];
            &fallback[..]
        } else {
            schemes
        };

        let Some(header) = authorization else {
            return AuthOutcome::Unauthorized(ask_for_credentials(schemes));
        };

        let credentials = match Credentials::parse(header) {
            Ok(credentials) => credentials,
            Err(CredentialsError::UnsupportedScheme(_)) => {
                return AuthOutcome::Unauthorized(ask_for_credentials(schemes));
            }
            Err(CredentialsError::Malformed(kind)) => {
                return AuthOutcome::Unauthorized(
                    match schemes.iter().find(|s| s.kind() == kind) {
                        Some(scheme) => scheme.challenge(Some(BearerError::InvalidRequest)).render(),
                        None => ask_for_credentials(schemes),
                    },
                );
            }
        };

        let Some(scheme) = schemes.iter().find(|s| s.kind() == credentials.scheme()) else {
            return AuthOutcome::Unauthorized(ask_for_credentials(schemes));
        };

        match self.validator.validate(&credentials) {
            Some(principal) => AuthOutcome::Authorized(principal),
            None => AuthOutcome::Unauthorized(scheme.challenge(Some(BearerError::InvalidToken)).render()),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("default_realm", &self.default_realm)
            .finish_non_exhaustive()
    }
}

fn ask_for_credentials(schemes: &[AuthScheme]) -> String {
    schemes
        .iter()
        .map(|s| s.challenge(None).render())
        .collect::<Vec<_>>()
        .join(", ")
}
