//! Metrics backends for the measurement middleware.
//!
//! The Prometheus recorder keeps its series in-process as atomics and is
//! rendered by the `/metrics` handler; no client library is involved.

pub mod prometheus;

pub use prometheus::{PrometheusConfig, PrometheusRecorder};
