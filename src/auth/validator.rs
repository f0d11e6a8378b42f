//! Credential validation boundary.

use std::collections::HashMap;

use crate::auth::{Credentials, Principal, SchemeKind};

/// External credential check. Returns the authenticated principal, or `None`
/// when the credentials are rejected.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, credentials: &Credentials) -> Option<Principal>;
}

/// Rejects everything. Used when no validator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl CredentialValidator for DenyAll {
    fn validate(&self, _credentials: &Credentials) -> Option<Principal> {
        None
    }
}

/// In-memory users and bearer tokens, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    /// Accept `token` and authenticate it as `principal`.
    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), principal.into());
        self
    }
}

impl CredentialValidator for StaticCredentials {
    fn validate(&self, credentials: &Credentials) -> Option<Principal> {
        match credentials {
            Credentials::Basic { username, password } => self
                .users
                .get(username)
                .filter(|expected| *expected == password)
                .map(|_| Principal::new(username.clone(), SchemeKind::Basic)),
            Credentials::Bearer { token } => self
                .tokens
                .get(token)
                .map(|name| Principal::new(name.clone(), SchemeKind::Bearer)),
        }
    }
}
