//! Persistence: writes each completed book to a named artifact.
//!
//! Best effort only: one attempt per closed connection, no retry, no fsync.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for completed books.
///
/// Called from a blocking thread; implementations may do synchronous I/O.
pub trait BookSink: Send + Sync + 'static {
    /// Store `lines` (terminators included, in document order) under `name`
    /// and return where they went.
    fn persist(&self, name: &str, lines: &[Arc<str>]) -> Result<PathBuf, PersistError>;
}

/// Artifact name for the connection with sequence number `seq`: `book_07`.
pub fn artifact_name(seq: u64) -> String {
    format!("book_{seq:02}")
}

/// Writes `<dir>/<name>.txt`, creating `dir` on first use.
#[derive(Debug, Clone)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BookSink for FsSink {
    fn persist(&self, name: &str, lines: &[Arc<str>]) -> Result<PathBuf, PersistError> {
        let path = self.dir.join(format!("{name}.txt"));
        let io_err = |source| PersistError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = std::fs::File::create(&path).map_err(io_err)?;
        let mut out = std::io::BufWriter::new(file);
        for line in lines {
            out.write_all(line.as_bytes()).map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
