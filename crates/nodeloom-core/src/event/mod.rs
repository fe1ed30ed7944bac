//! Event bus for layout intents and intent telemetry.
//!
//! Provides an `EventBus` that distributes `GraphEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
