//! Skill execution and validation engine for Nodeloom.
//!
//! This crate defines the `GraphApi` port and its in-memory `Store`, the
//! manifest mutation policy, the skill registry with its authorization
//! middleware, the intent dispatcher, and the five built-in skill families.
//! It depends only on `nodeloom-types` -- never on `nodeloom-infra` or any
//! filesystem/process IO crate.

pub mod dispatch;
pub mod event;
pub mod geometry;
pub mod graph_api;
pub mod ids;
pub mod path;
pub mod policy;
pub mod registry;
pub mod script;
pub mod skill;
pub mod store;
