//! Session: one connection's path from connect to persisted book.
//!
//! ```text
//! CONNECTING ──► RECEIVING ──► CLOSING ──► DONE
//!                    │            ▲
//!                    └── error ───┘
//! ```
//!
//! `CONNECTING` takes a sequence number. `RECEIVING` decodes chunks into
//! lines and appends each batch to the ledger. End of stream, a transport or
//! decode error, or shutdown all lead to `CLOSING`, which flushes any
//! unterminated tail and closes the document. `DONE` hands the book to the
//! sink.

use crate::persist::{artifact_name, BookSink};
use bookworm_core::decoder::{DecodeError, LineCodec};
use bookworm_core::{ConnectionId, Ledger};
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Hands out connection sequence numbers, starting at 1.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Receiving,
    Closing,
    Done,
}

/// Why `RECEIVING` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the stream.
    Eof,
    /// Reading failed.
    Transport,
    /// The stream was not decodable (invalid UTF-8 or an over-long line).
    Decode,
    /// The ledger refused an append.
    Ledger,
    /// The server is shutting down.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub connection: ConnectionId,
    pub lines: usize,
    pub end: SessionEnd,
    /// Where the book was written, or `None` if persisting failed.
    pub artifact: Option<PathBuf>,
}

/// Everything a session shares with the rest of the server.
#[derive(Clone)]
pub struct SessionContext {
    pub ledger: Arc<Ledger>,
    pub sink: Arc<dyn BookSink>,
    pub counter: Arc<SequenceCounter>,
    pub max_line_bytes: usize,
    pub cancel: CancellationToken,
}

struct Session {
    id: ConnectionId,
    state: SessionState,
    lines: usize,
}

impl Session {
    fn connect(counter: &SequenceCounter, peer: SocketAddr) -> Self {
        let id = ConnectionId::new(counter.next(), peer);
        tracing::info!(connection = %id, "connected");
        Self {
            id,
            state: SessionState::Connecting,
            lines: 0,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(connection = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn append(&mut self, ledger: &Ledger, batch: Vec<String>) -> Result<(), SessionEnd> {
        for line in &batch {
            tracing::trace!(connection = %self.id, line = line.trim_end(), "processing line");
        }
        match ledger.append_lines(self.id, batch) {
            Ok(n) => {
                self.lines += n;
                Ok(())
            }
            Err(err) => {
                tracing::error!(connection = %self.id, %err, "ledger rejected line");
                Err(SessionEnd::Ledger)
            }
        }
    }
}

/// Drive one connection to completion.
///
/// Never fails: every error is logged and ends this session only.
pub async fn run_session<T>(ctx: &SessionContext, transport: T, peer: SocketAddr) -> SessionOutcome
where
    T: AsyncRead + Unpin + Send,
{
    let mut session = Session::connect(&ctx.counter, peer);
    session.transition(SessionState::Receiving);

    let mut framed = FramedRead::new(transport, LineCodec::new(ctx.max_line_bytes));
    let end = loop {
        let item = tokio::select! {
            _ = ctx.cancel.cancelled() => break SessionEnd::Shutdown,
            item = framed.next() => item,
        };
        match item {
            Some(Ok(batch)) => {
                tracing::debug!(
                    connection = %session.id,
                    lines = batch.len(),
                    carry = framed.read_buffer().len(),
                    "decoded lines"
                );
                if let Err(end) = session.append(&ctx.ledger, batch) {
                    break end;
                }
            }
            Some(Err(DecodeError::Io(err))) => {
                tracing::warn!(connection = %session.id, %err, "transport error");
                break SessionEnd::Transport;
            }
            Some(Err(err)) => {
                tracing::warn!(connection = %session.id, %err, "undecodable stream");
                break SessionEnd::Decode;
            }
            None => break SessionEnd::Eof,
        }
    };
    tracing::info!(connection = %session.id, ?end, "connection closed");

    session.transition(SessionState::Closing);
    let mut parts = framed.into_parts();
    // After a ledger refusal the tail has nowhere to go.
    if end != SessionEnd::Ledger {
        if let Some(tail) = parts.codec.flush(&mut parts.read_buf) {
            // Already logged; the book is persisted either way.
            let _ = session.append(&ctx.ledger, tail);
        }
    }
    let book = ctx.ledger.close_document(session.id);

    let name = artifact_name(session.id.seq);
    tracing::info!(connection = %session.id, %name, lines = book.len(), "writing book");
    let sink = Arc::clone(&ctx.sink);
    let artifact = match tokio::task::spawn_blocking(move || sink.persist(&name, &book)).await {
        Ok(Ok(path)) => {
            tracing::info!(connection = %session.id, path = %path.display(), "book written");
            Some(path)
        }
        Ok(Err(err)) => {
            tracing::error!(connection = %session.id, %err, "failed to persist book");
            None
        }
        Err(err) => {
            tracing::error!(connection = %session.id, %err, "persist task failed");
            None
        }
    };

    drop(parts.io);
    session.transition(SessionState::Done);

    SessionOutcome {
        connection: session.id,
        lines: session.lines,
        end,
        artifact,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
