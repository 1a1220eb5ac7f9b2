//! Top-level facade crate for httpmetrics.
//!
//! Re-exports the measurement core and the axum/Prometheus gateway so users
//! can depend on a single crate:
//!
//! ```ignore
//! use httpmetrics::gateway::measure::{self, Measure};
//! use httpmetrics::gateway::obs::{PrometheusConfig, PrometheusRecorder};
//! use httpmetrics::{Config, Middleware};
//!
//! let recorder = Arc::new(PrometheusRecorder::new(PrometheusConfig::default())?);
//! let mw = Middleware::new(Config { recorder: recorder.clone(), ..Config::default() });
//! let app = Router::new()
//!     .route("/users/:id", get(user))
//!     .route_layer(from_fn_with_state(Measure::by_path(mw), measure::track));
//! ```

pub mod core {
    pub use httpmetrics_core::*;
}

pub mod gateway {
    pub use httpmetrics_gateway::*;
}

pub use httpmetrics_core::metrics::Recorder;
pub use httpmetrics_core::middleware::{Config, Middleware};
pub use httpmetrics_core::{HttpMetricsError, Result};
