//! HTTP/1.1 message model and framing.
//!
//! # Data Flow
//! ```text
//! socket bytes
//!     → framer.rs (request line, header block, Content-Length body)
//!     → request.rs (immutable Request, per-connection RequestId)
//!     → [dispatch layer produces a Response]
//!     → response.rs (status line + headers + payload onto the wire)
//! ```
//!
//! # Design Decisions
//! - Header names are stored lowercased, values comma-split
//! - Bodies are framed by `Content-Length` only; no chunked coding
//! - Response ids equal the id of the request they answer

pub mod framer;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod server;
pub mod version;

pub use framer::{Framer, FramingError};
pub use headers::{Headers, InvalidContentLength};
pub use method::Method;
pub use request::{Request, RequestId};
pub use response::{Content, Response};
pub use server::{HttpServer, HttpServerBuilder, ServerError};
pub use version::Version;

pub use ::http::StatusCode;
