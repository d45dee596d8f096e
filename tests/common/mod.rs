//! Shared test utilities for bookworm integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Helpers are deterministic where they can be; the
//! server harness uses real sockets and wall-clock timers.

pub mod assertions;
pub mod builders;
pub mod fake_client;
pub mod fixtures;

pub use builders::*;
pub use fake_client::*;
pub use fixtures::*;
