//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Detect duplicate credentials and static paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::ServerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Smallest header budget that still fits a request line.
const MIN_HEADER_SECTION_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `listener.bind_address`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than 0",
        ));
    }
    if config.limits.max_content_length == 0 {
        errors.push(ValidationError::new(
            "limits.max_content_length",
            "must be greater than 0",
        ));
    }
    if config.limits.max_header_section_len < MIN_HEADER_SECTION_LEN {
        errors.push(ValidationError::new(
            "limits.max_header_section_len",
            format!("must be at least {MIN_HEADER_SECTION_LEN}"),
        ));
    }
    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::new("timeouts.idle_secs", "must be greater than 0"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "`{}` is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    let mut usernames = HashSet::new();
    for (i, user) in config.auth.users.iter().enumerate() {
        if user.username.is_empty() || user.username.contains(':') {
            errors.push(ValidationError::new(
                format!("auth.users[{i}].username"),
                "must be non-empty and contain no `:`",
            ));
        } else if !usernames.insert(user.username.as_str()) {
            errors.push(ValidationError::new(
                format!("auth.users[{i}].username"),
                format!("duplicate user `{}`", user.username),
            ));
        }
    }

    let mut tokens = HashSet::new();
    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.token.is_empty() {
            errors.push(ValidationError::new(format!("auth.tokens[{i}].token"), "must be non-empty"));
        } else if !tokens.insert(token.token.as_str()) {
            errors.push(ValidationError::new(format!("auth.tokens[{i}].token"), "duplicate token"));
        }
    }

    let mut paths = HashSet::new();
    for (i, resource) in config.statics.iter().enumerate() {
        if !resource.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("statics[{i}].path"),
                "must start with `/`",
            ));
        } else if !paths.insert(resource.path.as_str()) {
            errors.push(ValidationError::new(
                format!("statics[{i}].path"),
                format!("duplicate path `{}`", resource.path),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
