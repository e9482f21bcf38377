//! Observability setup for Huddle: structured logging via `tracing` with an
//! optional OpenTelemetry span exporter.

pub mod tracing_setup;
