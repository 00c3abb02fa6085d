//! bytepatch library crate — re-exports for integration tests.
//!
//! The primary interface is the `bytepatch` binary. This lib.rs exposes the
//! internal modules so that integration tests can exercise the merge engine,
//! container codec, and model types directly without going through the CLI.

pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod log;
pub mod model;
pub mod patch;
pub mod rewrite;
