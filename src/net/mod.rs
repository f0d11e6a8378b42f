//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking)
//!     → supervisor.rs (read loop: frame → admit → body → pool)
//!     → pool.rs (bounded dispatch workers)
//!     → sequencer.rs (responses back out, in request order)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - One reader and one ordered writer per connection; everything between
//!   them may run concurrently

pub mod connection;
pub mod listener;
pub mod pool;
pub mod sequencer;
pub mod supervisor;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use pool::WorkerPool;
pub use sequencer::{ResponseSequencer, SequencerError};
pub use supervisor::{supervise, ConnectionContext, ConnectionOutcome};
