//! httpmetrics gateway library entry.
//!
//! Wires the measurement middleware into axum, provides the in-process
//! Prometheus recorder and the config loader. Consumed by the demo binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod measure;
pub mod obs;
pub mod ops;
pub mod router;
