//! In-order response writing for one connection.
//!
//! # Responsibilities
//! - Accept responses from any worker in any order
//! - Write them to the socket strictly in request-id order
//! - Close the write side after a `Connection: close` response or a write
//!   failure, and tell the read side about it
//!
//! # Design Decisions
//! - One mutex guards both the reorder buffer and the writer, so a response
//!   is never interleaved with another on the wire
//! - Whoever submits the missing id drains every consecutive ready response
//! - The id counter wraps at `u64::MAX` just like the framer's

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};

use crate::http::{RequestId, Response};

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("connection closed, response {0} discarded")]
    Closed(RequestId),

    #[error("failed to write response {id}: {source}")]
    Write {
        id: RequestId,
        #[source]
        source: io::Error,
    },
}

struct State<W> {
    writer: W,
    next_expected: RequestId,
    pending: HashMap<RequestId, Response>,
    closed: bool,
}

pub struct ResponseSequencer<W> {
    state: Mutex<State<W>>,
    closed: watch::Sender<bool>,
}

impl<W> ResponseSequencer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// `first` must match the id the connection's framer hands out first.
    pub fn new(writer: W, first: RequestId) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            state: Mutex::new(State {
                writer,
                next_expected: first,
                pending: HashMap::new(),
                closed: false,
            }),
            closed,
        }
    }

    /// Hand over a finished response. Returns how many responses went out on
    /// the wire as a result (0 when it has to wait for an earlier one).
    pub async fn submit(&self, response: Response) -> Result<usize, SequencerError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if state.closed {
            return Err(SequencerError::Closed(response.id()));
        }
        state.pending.insert(response.id(), response);

        let mut written = 0;
        while let Some(next) = state.pending.remove(&state.next_expected) {
            let id = next.id();
            if let Err(source) = next.write_to(&mut state.writer).await {
                tracing::debug!(request_id = %id, error = %source, "Response write failed");
                self.close(state).await;
                return Err(SequencerError::Write { id, source });
            }
            tracing::trace!(request_id = %id, status = next.status().as_u16(), "Response written");
            state.next_expected = id.next();
            written += 1;

            if next.closes_connection() {
                self.close(state).await;
                break;
            }
        }
        Ok(written)
    }

    /// Resolves to `true` once the write side is closed.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn next_expected(&self) -> RequestId {
        self.state.lock().await.next_expected
    }

    /// Drop anything still buffered and shut the writer down.
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        if !guard.closed {
            self.close(&mut guard).await;
        }
    }

    async fn close(&self, state: &mut State<W>) {
        state.closed = true;
        if !state.pending.is_empty() {
            tracing::debug!(discarded = state.pending.len(), "Dropping unsent responses");
            state.pending.clear();
        }
        // The peer may already be gone.
        let _ = state.writer.shutdown().await;
        self.closed.send_replace(true);
    }

    pub fn into_writer(self) -> W {
        self.state.into_inner().writer
    }
}
