//! bookworm-server: the I/O edges of bookworm.
//!
//! The accept loop hands each TCP connection to a session task. A session
//! decodes the stream into lines, appends them to the shared
//! [`bookworm_core::Ledger`], and on close hands the finished book to a
//! [`persist::BookSink`].

pub mod persist;
pub mod server;
pub mod session;

pub use persist::{artifact_name, BookSink, FsSink, PersistError};
pub use server::{Server, ServerError};
pub use session::{run_session, SequenceCounter, SessionContext, SessionEnd, SessionOutcome};
