//! Test builders: ergonomic constructors for ledgers, sinks and sessions.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use bookworm::analysis::Pattern;
use bookworm::config::Settings;
use bookworm::persist::{BookSink, PersistError};
use bookworm::session::{SequenceCounter, SessionContext};
use bookworm::{ConnectionId, Ledger, PatternMode, ReportFormat};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

pub fn peer(n: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40_000 + n))
}

pub fn conn(seq: u64) -> ConnectionId {
    ConnectionId::new(seq, peer(seq as u16))
}

// ---------------------------------------------------------------------------
// LedgerBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for pre-populated ledgers.
///
/// # Example
///
/// ```rust
/// let ledger = LedgerBuilder::new()
///     .book(1, &["Title One\n", "has cat cat\n"])
///     .book(2, &["Title Two\n", "cat\n"])
///     .build();
/// ```
#[derive(Default)]
pub struct LedgerBuilder {
    ledger: Ledger,
}

impl LedgerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(self, seq: u64, lines: &[&str]) -> Self {
        self.ledger
            .append_lines(conn(seq), lines.iter().copied())
            .expect("fresh document accepts lines");
        self
    }

    pub fn closed_book(self, seq: u64, lines: &[&str]) -> Self {
        let this = self.book(seq, lines);
        this.ledger.close_document(conn(seq));
        this
    }

    pub fn build(self) -> Arc<Ledger> {
        Arc::new(self.ledger)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// In-memory sink recording every persisted book as `(name, content)`.
#[derive(Default)]
pub struct RecordingSink {
    books: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn books(&self) -> Vec<(String, String)> {
        self.books.lock().unwrap().clone()
    }

    pub fn book(&self, name: &str) -> Option<String> {
        self.books()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content)
    }
}

impl BookSink for RecordingSink {
    fn persist(&self, name: &str, lines: &[Arc<str>]) -> Result<PathBuf, PersistError> {
        self.books
            .lock()
            .unwrap()
            .push((name.to_string(), lines.concat()));
        Ok(PathBuf::from(format!("{name}.txt")))
    }
}

/// Sink that always fails, for persistence-error paths.
pub struct FailingSink;

impl BookSink for FailingSink {
    fn persist(&self, name: &str, _lines: &[Arc<str>]) -> Result<PathBuf, PersistError> {
        Err(PersistError::Io {
            path: PathBuf::from(format!("{name}.txt")),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

// ---------------------------------------------------------------------------
// Contexts and settings
// ---------------------------------------------------------------------------

pub fn session_context(sink: Arc<dyn BookSink>) -> SessionContext {
    SessionContext {
        ledger: Arc::new(Ledger::new()),
        sink,
        counter: Arc::new(SequenceCounter::new()),
        max_line_bytes: 1024,
        cancel: CancellationToken::new(),
    }
}

/// Settings for an app bound to an ephemeral port on loopback.
pub fn settings(output_dir: &Path, pattern: &str, interval: Duration) -> Settings {
    Settings {
        bind: [127, 0, 0, 1].into(),
        port: 0,
        output_dir: output_dir.to_path_buf(),
        max_line_bytes: 1024 * 1024,
        pattern: Pattern::new(pattern, PatternMode::Literal).expect("valid literal pattern"),
        interval,
        worker_count: 2,
        report_format: ReportFormat::Text,
    }
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split `bytes` at the given offsets (sorted, deduplicated, clamped).
pub fn chunk_at(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|&c| c.min(bytes.len())).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::with_capacity(points.len() + 1);
    let mut start = 0;
    for p in points {
        chunks.push(bytes[start..p].to_vec());
        start = p;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}
