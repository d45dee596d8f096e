//! Ledger: the shared, globally ordered record of every line ever received.
//!
//! Records live in an append-only arena. Arena order is the global chain, so
//! `global_next` is implicit. Each record also carries a `document_next` link
//! threading it into its connection's document. Both chains are only ever
//! extended together, inside one critical section, by [`Ledger::append_line`]
//! or [`Ledger::append_lines`]; readers see them through a [`LedgerView`]
//! borrowed under the same lock.
//!
//! The lock is deliberately global: analysis scans stall ingestion for the
//! duration of a walk.

use crate::types::{ConnectionId, LineId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("document {connection} is closed")]
    DocumentClosed { connection: ConnectionId },
}

/// One decoded line, terminator included, plus its place in its document.
#[derive(Debug, Clone)]
pub struct LineRecord {
    content: Arc<str>,
    document: ConnectionId,
    document_next: Option<LineId>,
}

impl LineRecord {
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Shared handle to the content; cloning it never copies the text.
    pub fn shared_content(&self) -> Arc<str> {
        Arc::clone(&self.content)
    }

    pub fn document(&self) -> ConnectionId {
        self.document
    }

    pub fn document_next(&self) -> Option<LineId> {
        self.document_next
    }
}

/// The lines received on one connection.
///
/// `tail` is always the one record of this document whose `document_next` is
/// unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: ConnectionId,
    pub head: LineId,
    pub tail: LineId,
    pub len: usize,
    pub closed: bool,
}

/// Point-in-time counters, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub lines: usize,
    pub documents: usize,
    pub open_documents: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<LineRecord>,
    /// Documents in first-line order; `index` maps identity to position.
    documents: Vec<Document>,
    index: HashMap<ConnectionId, usize>,
}

impl LedgerState {
    fn append(&mut self, connection: ConnectionId, content: Arc<str>) -> Result<LineId, LedgerError> {
        let id = LineId::from_index(self.records.len());

        match self.index.get(&connection) {
            Some(&pos) => {
                let doc = &mut self.documents[pos];
                if doc.closed {
                    return Err(LedgerError::DocumentClosed { connection });
                }
                let prev_tail = doc.tail;
                doc.tail = id;
                doc.len += 1;
                self.records[prev_tail.index()].document_next = Some(id);
            }
            None => {
                self.index.insert(connection, self.documents.len());
                self.documents.push(Document {
                    id: connection,
                    head: id,
                    tail: id,
                    len: 1,
                    closed: false,
                });
            }
        }

        self.records.push(LineRecord {
            content,
            document: connection,
            document_next: None,
        });
        Ok(id)
    }
}

/// Thread-safe append log of all lines plus the per-connection document map.
///
/// Share it as `Arc<Ledger>`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves the state whole before returning, so a panic
    // elsewhere while the lock was held cannot have torn it.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one line to the global chain and to `connection`'s document,
    /// registering the document if this is its first line.
    pub fn append_line(
        &self,
        connection: ConnectionId,
        content: impl Into<Arc<str>>,
    ) -> Result<LineId, LedgerError> {
        self.lock().append(connection, content.into())
    }

    /// Append a decoded batch under a single lock acquisition.
    ///
    /// Returns the number of lines appended. Stops at the first error, leaving
    /// any earlier lines of the batch in place.
    pub fn append_lines<I, S>(&self, connection: ConnectionId, lines: I) -> Result<usize, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut state = self.lock();
        let mut appended = 0;
        for line in lines {
            state.append(connection, line.into())?;
            appended += 1;
        }
        Ok(appended)
    }

    /// Mark `connection`'s document closed and return its lines in document
    /// order. A connection that never delivered a line has no document and
    /// yields an empty list.
    pub fn close_document(&self, connection: ConnectionId) -> Vec<Arc<str>> {
        let mut state = self.lock();
        let Some(&pos) = state.index.get(&connection) else {
            return Vec::new();
        };
        state.documents[pos].closed = true;
        let view = LedgerView { state: &state };
        view.document_lines(connection)
            .map(LineRecord::shared_content)
            .collect()
    }

    /// Identity → head of every document, in first-line order.
    pub fn snapshot_documents(&self) -> Vec<(ConnectionId, LineId)> {
        self.read(|view| view.snapshot_documents())
    }

    /// Run `f` against a consistent view of the whole ledger. No append can
    /// interleave with `f`.
    pub fn read<R>(&self, f: impl FnOnce(LedgerView<'_>) -> R) -> R {
        let state = self.lock();
        f(LedgerView { state: &state })
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.lock();
        LedgerStats {
            lines: state.records.len(),
            documents: state.documents.len(),
            open_documents: state.documents.iter().filter(|d| !d.closed).count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Read-only view
// ---------------------------------------------------------------------------

/// Borrowed, read-only access to the ledger while its lock is held.
#[derive(Clone, Copy)]
pub struct LedgerView<'a> {
    state: &'a LedgerState,
}

impl<'a> LedgerView<'a> {
    pub fn documents(&self) -> impl Iterator<Item = &'a Document> + 'a {
        self.state.documents.iter()
    }

    pub fn document(&self, connection: ConnectionId) -> Option<&'a Document> {
        let state = self.state;
        state.index.get(&connection).map(|&pos| &state.documents[pos])
    }

    pub fn snapshot_documents(&self) -> Vec<(ConnectionId, LineId)> {
        self.documents().map(|d| (d.id, d.head)).collect()
    }

    pub fn record(&self, id: LineId) -> Option<&'a LineRecord> {
        self.state.records.get(id.index())
    }

    pub fn global_head(&self) -> Option<LineId> {
        (!self.state.records.is_empty()).then_some(LineId(0))
    }

    pub fn global_tail(&self) -> Option<LineId> {
        self.state.records.len().checked_sub(1).map(LineId::from_index)
    }

    pub fn global_next(&self, id: LineId) -> Option<LineId> {
        let next = id.index() + 1;
        (next < self.state.records.len()).then(|| LineId::from_index(next))
    }

    /// Every record in global arrival order.
    pub fn global_lines(&self) -> impl Iterator<Item = &'a LineRecord> + 'a {
        self.state.records.iter()
    }

    /// Walk a document chain starting at `head`.
    pub fn chain_from(&self, head: LineId) -> DocumentLines<'a> {
        DocumentLines {
            records: &self.state.records,
            next: Some(head),
        }
    }

    /// Walk `connection`'s document in order; empty if it has no document.
    pub fn document_lines(&self, connection: ConnectionId) -> DocumentLines<'a> {
        DocumentLines {
            records: &self.state.records,
            next: self.document(connection).map(|d| d.head),
        }
    }
}

/// Iterator following `document_next` links.
pub struct DocumentLines<'a> {
    records: &'a [LineRecord],
    next: Option<LineId>,
}

impl<'a> Iterator for DocumentLines<'a> {
    type Item = &'a LineRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.next?.index())?;
        self.next = record.document_next;
        Some(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
