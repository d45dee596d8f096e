//! bookworm: concurrent book ingestion server.
//!
//! Clients stream newline-delimited books over TCP. Every line lands in one
//! globally ordered ledger and in its connection's own document; analysis
//! workers periodically rank documents by how often a configured pattern
//! occurs; each book is written to `book_NN.txt` when its connection closes.
//!
//! # Architecture
//!
//! ```text
//! TCP ──► Session ──► Decoder ──► Ledger ◄── Analysis workers ──► report
//!            │
//!            └──► FsSink (book_NN.txt)
//! ```
//!
//! This crate re-exports the layers so integration tests can import them
//! directly, and wires them together in [`app`].

pub mod app;

pub use bookworm_core::{analysis, config, decoder, ledger, types};
pub use bookworm_core::{ConnectionId, Ledger, LineId, Pattern, PatternMode, ReportFormat};
pub use bookworm_server::{persist, server, session};
