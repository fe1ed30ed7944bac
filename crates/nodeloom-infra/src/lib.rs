//! Infrastructure for Nodeloom.
//!
//! Everything that touches the filesystem or spawns processes lives here:
//! engine config loading, graph snapshot files, definition catalogues, and
//! the subprocess-backed script runner.

pub mod catalog;
pub mod config;
pub mod script;
pub mod snapshot;
