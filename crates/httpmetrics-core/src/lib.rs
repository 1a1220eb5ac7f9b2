//! httpmetrics core: recorder contract, measurement procedure and response
//! interception shared by every HTTP stack adapter.
//!
//! This crate carries no async runtime or web framework dependency. Adapters
//! translate their native request/response types into a
//! [`middleware::Reporter`] and call into [`middleware::Middleware`]; metrics
//! backends implement [`metrics::Recorder`].
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A failure to record a metric must never change the response a client
//! receives, so nothing on the measurement path is allowed to abort.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metrics;
pub mod middleware;

/// Shared result type.
pub use error::{HttpMetricsError, Result};
