//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! (method, path)
//!     → router.rs (resolve)
//!     → registry.rs (endpoint lookup, exact match)
//!     → statics.rs (GET/HEAD fallback to static resources)
//!     → Return: Route::Endpoint / Route::Static or RouteNotFound
//!
//! Registration (at startup):
//!     handlers + auth requirements
//!     → HandlerDescriptor
//!     → Endpoints (frozen, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Registries are populated once and never written at request time
//! - Handlers are trait objects registered explicitly, not looked up by name
//! - Deterministic: same input always resolves the same route

pub mod handler;
pub mod registry;
pub mod router;
pub mod statics;

pub use handler::{Handler, HandlerDescriptor, HandlerError};
pub use registry::{DuplicateEndpoint, EndpointRegistry, Endpoints};
pub use router::{Route, RouteNotFound, Router};
pub use statics::{content_type_for, StaticFiles, StaticResource, StaticResourceRegistry};
