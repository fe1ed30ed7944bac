//! Shared domain types for Nodeloom.
//!
//! This crate contains the graph data model (nodes, edges, groups), the
//! manifest node schema, skill descriptors and results, engine events, and
//! engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, schemars, uuid, chrono, thiserror.

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod manifest;
pub mod skill;
pub mod validation;
