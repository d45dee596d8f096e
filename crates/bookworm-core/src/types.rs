//! Core types for bookworm-core.
//!
//! This module defines the identifiers shared across all layers: the
//! [`ConnectionId`] that names a document and the [`LineId`] that names a
//! record in the ledger's append-only arena.

use std::net::SocketAddr;

/// Identity of one client connection, and therefore of one document.
///
/// `seq` is the connection's arrival index, handed out by the session
/// counter. The peer address alone is not unique: a client may reconnect from
/// the same address after an earlier session has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ConnectionId {
    pub seq: u64,
    pub peer: SocketAddr,
}

impl ConnectionId {
    pub fn new(seq: u64, peer: SocketAddr) -> Self {
        Self { seq, peer }
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.seq, self.peer)
    }
}

/// Position of a line record in the global ingestion order.
///
/// The ledger stores records in an append-only arena, so the id is also the
/// record's index there: `LineId(0)` is the global head and `LineId(n + 1)`
/// is the global successor of `LineId(n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct LineId(pub u64);

impl LineId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u64)
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
