//! Per-connection supervision.
//!
//! # Responsibilities
//! - Run the read loop: frame, admit, read body, hand off to the pool
//! - Answer rejected and unframeable requests without invoking handlers
//! - Keep the byte stream aligned across rejected requests with bodies
//! - Stop reading on `Connection: close`, idle timeout, shutdown, or once
//!   the write side has closed
//! - Tear the connection down only after every in-flight response resolved
//!
//! # Design Decisions
//! - Every read, head or body, is bounded by the idle timeout and raced
//!   against the stop signal; a stalled body ends the connection without
//!   a response
//! - Hand-off to the pool waits for a free worker, so a pipelining client
//!   is paused at the read loop instead of queueing unbounded work
//!
//! # Data Flow
//! ```text
//! socket ─ split ─▶ read half  → Framer → Dispatcher::admit
//!                                  │            ├─ Err → reject → Sequencer
//!                                  │            └─ Ok  → read body → pool
//!                                  │                        → invoke → Sequencer
//!                  write half ◀───────────────────────── Sequencer (in order)
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::{Framer, Request, RequestId, Response};
use crate::net::pool::WorkerPool;
use crate::net::sequencer::ResponseSequencer;
use crate::observability::metrics;

/// Everything a connection needs, shared by all connections of a server.
#[derive(Debug)]
pub struct ConnectionContext {
    pub dispatcher: Arc<Dispatcher>,
    pub pool: Arc<WorkerPool>,
    pub max_head_len: usize,
    pub idle_timeout: Duration,
}

/// Why a connection's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Clean end of stream between requests.
    PeerClosed,
    /// A request (or a terminal rejection) asked for `Connection: close`.
    CloseRequested,
    /// Unframeable input; a terminal error response was queued.
    Malformed,
    /// Transport failure or end of stream mid-request.
    ReadFailed,
    /// The write side closed first.
    WriteClosed,
    IdleTimeout,
    Shutdown,
}

/// Drive one connection until it is done. Never fails: every way the
/// connection can end is an outcome.
pub async fn supervise<S>(
    stream: S,
    ctx: Arc<ConnectionContext>,
    mut stop: broadcast::Receiver<()>,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let sequencer = Arc::new(ResponseSequencer::new(write_half, RequestId::ZERO));
    let mut framer = Framer::new(BufReader::new(read_half), ctx.max_head_len);
    let mut write_closed = sequencer.closed();
    let mut dispatches: Vec<JoinHandle<Option<()>>> = Vec::new();

    let outcome = loop {
        dispatches.retain(|handle| !handle.is_finished());

        let next = tokio::select! {
            biased;
            Ok(()) = stop.recv() => break ConnectionOutcome::Shutdown,
            Ok(_) = write_closed.wait_for(|closed| *closed) => break ConnectionOutcome::WriteClosed,
            next = tokio::time::timeout(ctx.idle_timeout, framer.next_request()) => next,
        };

        let mut request = match next {
            Err(_) => {
                tracing::debug!(in_flight = dispatches.len(), "Idle timeout");
                break ConnectionOutcome::IdleTimeout;
            }
            Ok(Ok(None)) => break ConnectionOutcome::PeerClosed,
            Ok(Ok(Some(request))) => request,
            Ok(Err(error)) => {
                metrics::record_framing_error(error.kind());
                let Some(status) = error.status() else {
                    tracing::debug!(error = %error, "Connection read failed");
                    break ConnectionOutcome::ReadFailed;
                };
                tracing::debug!(
                    request_id = %framer.next_id(),
                    error = %error,
                    status = status.as_u16(),
                    "Unframeable request"
                );
                let response = ctx.dispatcher.framing_rejection(framer.next_id(), status);
                submit(&sequencer, response).await;
                break ConnectionOutcome::Malformed;
            }
        };

        let close = request.wants_close();
        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            path = request.path(),
            "Request framed"
        );

        let admission = match ctx.dispatcher.admit(&request) {
            Ok(admission) => admission,
            Err(error) => {
                let aligned = if error.is_terminal() {
                    false
                } else {
                    match skip_body(&mut framer, &ctx, &mut stop, &request).await {
                        Ok(aligned) => aligned,
                        Err(interrupted) => break interrupted,
                    }
                };
                tracing::debug!(
                    request_id = %request.id(),
                    status = error.status().as_u16(),
                    kind = error.kind(),
                    "Request rejected"
                );
                let response = ctx.dispatcher.reject(&request, &error, close || !aligned);
                submit(&sequencer, response).await;
                if close || !aligned {
                    break ConnectionOutcome::CloseRequested;
                }
                continue;
            }
        };

        if admission.body_len() > 0 {
            let read = framer.read_body(admission.body_len());
            match guarded_read(&mut stop, ctx.idle_timeout, read).await {
                BodyRead::Done(Ok(body)) => request = request.with_body(body),
                BodyRead::Done(Err(e)) => {
                    let error = DispatchError::BodyRead(e.to_string());
                    tracing::debug!(request_id = %request.id(), error = %error, "Body read failed");
                    let response = ctx.dispatcher.reject(&request, &error, true);
                    submit(&sequencer, response).await;
                    break ConnectionOutcome::ReadFailed;
                }
                BodyRead::Interrupted(outcome) => {
                    tracing::debug!(request_id = %request.id(), outcome = ?outcome, "Body read interrupted");
                    break outcome;
                }
            }
        }

        let dispatcher = Arc::clone(&ctx.dispatcher);
        let responses = Arc::clone(&sequencer);
        let dispatch = async move {
            let response = dispatcher.invoke(request, admission).await;
            submit(&responses, response).await;
        };
        let spawned = tokio::select! {
            biased;
            Ok(()) = stop.recv() => break ConnectionOutcome::Shutdown,
            spawned = ctx.pool.spawn(dispatch) => spawned,
        };
        match spawned {
            Some(handle) => dispatches.push(handle),
            None => break ConnectionOutcome::Shutdown,
        }

        if close {
            break ConnectionOutcome::CloseRequested;
        }
    };

    for handle in dispatches {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Dispatch task failed");
        }
    }
    sequencer.shutdown().await;

    tracing::debug!(outcome = ?outcome, "Connection finished");
    outcome
}

enum BodyRead<T> {
    Done(io::Result<T>),
    /// Idle timeout or shutdown fired before the read completed.
    Interrupted(ConnectionOutcome),
}

/// Run a body read under the same idle timeout and stop signal as the
/// head read.
async fn guarded_read<T>(
    stop: &mut broadcast::Receiver<()>,
    idle_timeout: Duration,
    read: impl Future<Output = io::Result<T>>,
) -> BodyRead<T> {
    tokio::select! {
        biased;
        Ok(()) = stop.recv() => BodyRead::Interrupted(ConnectionOutcome::Shutdown),
        read = tokio::time::timeout(idle_timeout, read) => match read {
            Ok(result) => BodyRead::Done(result),
            Err(_) => BodyRead::Interrupted(ConnectionOutcome::IdleTimeout),
        },
    }
}

/// Consume the declared body of a rejected request so the next request
/// frames correctly. `Ok(false)` means the stream can no longer be trusted
/// to be aligned; `Err` means the connection must end without a response.
async fn skip_body<R>(
    framer: &mut Framer<R>,
    ctx: &ConnectionContext,
    stop: &mut broadcast::Receiver<()>,
    request: &Request,
) -> Result<bool, ConnectionOutcome>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let declared = match request.headers().content_length() {
        Ok(declared) => declared.unwrap_or(0),
        Err(_) => return Ok(false),
    };
    if declared == 0 {
        return Ok(true);
    }
    if declared > ctx.dispatcher.max_content_length() {
        return Ok(false);
    }
    match guarded_read(stop, ctx.idle_timeout, framer.discard_body(declared)).await {
        BodyRead::Done(result) => Ok(result.is_ok()),
        BodyRead::Interrupted(outcome) => Err(outcome),
    }
}

async fn submit<W>(sequencer: &ResponseSequencer<W>, response: Response)
where
    W: AsyncWrite + Unpin + Send,
{
    if let Err(e) = sequencer.submit(response).await {
        tracing::debug!(error = %e, "Response not delivered");
    }
}
