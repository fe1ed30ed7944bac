//! Observability for Nodeloom: tracing subscriber setup and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
