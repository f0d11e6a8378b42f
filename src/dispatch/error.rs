//! Dispatch failure taxonomy.

use http::StatusCode;

use crate::http::Method;

/// Every way a framed request can fail to reach (or come back from) its
/// handler. Each variant maps to exactly one status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("authentication required")]
    Unauthorized { challenge: String },

    #[error("{method} request carries `{header}` but has no body semantics")]
    UnexpectedContent { method: Method, header: String },

    #[error("declared body of {declared} bytes exceeds limit of {limit}")]
    BodyTooLarge { declared: u64, limit: u64 },

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("transfer-encoding `{0}` is not supported")]
    UnsupportedTransferEncoding(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("handler `{handler}` failed: {reason}")]
    HandlerInvocation { handler: String, reason: String },
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            DispatchError::UnexpectedContent { .. }
            | DispatchError::BodyTooLarge { .. }
            | DispatchError::InvalidContentLength(_) => StatusCode::BAD_REQUEST,
            DispatchError::UnsupportedTransferEncoding(_) => StatusCode::NOT_IMPLEMENTED,
            DispatchError::BodyRead(_) | DispatchError::HandlerInvocation { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The request body cannot be skipped reliably after this error, so the
    /// connection closes once the response is out.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchError::BodyTooLarge { .. }
                | DispatchError::InvalidContentLength(_)
                | DispatchError::UnsupportedTransferEncoding(_)
                | DispatchError::BodyRead(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RouteNotFound { .. } => "route_not_found",
            DispatchError::Unauthorized { .. } => "unauthorized",
            DispatchError::UnexpectedContent { .. } => "unexpected_content",
            DispatchError::BodyTooLarge { .. } => "body_too_large",
            DispatchError::InvalidContentLength(_) => "invalid_content_length",
            DispatchError::UnsupportedTransferEncoding(_) => "unsupported_transfer_encoding",
            DispatchError::BodyRead(_) => "body_read_failure",
            DispatchError::HandlerInvocation { .. } => "handler_invocation_failure",
        }
    }
}
