//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Server identity and default auth realm.
    pub server: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Built-in credential store.
    pub auth: AuthConfig,

    /// Static resources served for GET/HEAD.
    pub statics: Vec<StaticConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:2004").
    pub bind_address: String,

    /// Maximum concurrent connections. Also sizes the worker pool.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:2004".to_string(),
            max_connections: 1024,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted `Content-Length`, in bytes.
    pub max_content_length: u64,

    /// Request line plus header block, in bytes.
    pub max_header_section_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_length: 2 * 1024 * 1024, // 2MB
            max_header_section_len: 64 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a keep-alive connection may sit idle between requests.
    pub idle_secs: u64,

    /// Drain period for in-flight work on shutdown.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 60,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Value of the `Server` response header.
    pub name: String,

    /// Realm used when an endpoint requires auth without naming a scheme.
    pub default_realm: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: concat!("nexus-http/", env!("CARGO_PKG_VERSION")).to_string(),
            default_realm: "nexus".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Credentials accepted by the built-in validator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<UserConfig>,
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub token: String,

    /// Name the request is attributed to once the token is accepted.
    pub principal: String,
}

/// One static resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    /// Exact request path, e.g. "/index.html".
    pub path: String,

    /// File on disk.
    pub location: String,

    /// Explicit ETag. Derived from size and mtime when absent.
    #[serde(default)]
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:2004");
        assert_eq!(config.limits.max_content_length, 2 * 1024 * 1024);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(60));
        assert_eq!(config.server.default_realm, "nexus");
        assert!(config.server.name.starts_with("nexus-http/"));
        assert!(config.auth.users.is_empty());
    }

    #[test]
    fn parses_sections() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [observability]
            log_format = "pretty"

            [[auth.users]]
            username = "alice"
            password = "secret"

            [[auth.tokens]]
            token = "abc"
            principal = "ci"

            [[statics]]
            path = "/index.html"
            location = "/srv/www/index.html"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.listener.max_connections, 1024);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert_eq!(config.auth.users[0].username, "alice");
        assert_eq!(config.auth.tokens[0].principal, "ci");
        assert_eq!(config.statics[0].etag, None);
    }
}
