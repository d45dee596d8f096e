//! bookworm-core: the shared-state core of the bookworm ingestion server.
//!
//! This crate exposes the pipeline layers that do not touch sockets or the
//! filesystem, plus the shared types used across all layers.
//!
//! # Architecture
//!
//! ```text
//! bytes ──► Decoder ──► Session ──► Ledger ◄── Analysis workers
//!                          │                        │
//!                          └──► persisted book      └──► ranked report
//! ```
//!
//! Sessions and the accept loop live in `bookworm-server`. The ledger is the
//! single synchronisation point: every structural mutation and every whole
//! ledger scan goes through its lock.

pub mod analysis;
pub mod config;
pub mod decoder;
pub mod ledger;
pub mod types;

pub use analysis::{AnalysisEngine, FrequencyReport, Pattern, PatternMode, Ranked, ReportFormat};
pub use decoder::{DecodeError, LineCodec};
pub use ledger::{Ledger, LedgerError, LedgerView};
pub use types::{ConnectionId, LineId};
