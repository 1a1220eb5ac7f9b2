//! Shared application state for the httpmetrics gateway.
//!
//! Built once at startup: the Prometheus recorder is validated here so a bad
//! label or bucket configuration stops the process before it binds a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use httpmetrics_core::error::Result;
use httpmetrics_core::middleware::Middleware;

use crate::config::GatewayConfig;
use crate::obs::PrometheusRecorder;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    recorder: Arc<PrometheusRecorder>,
    middleware: Middleware,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let recorder = Arc::new(PrometheusRecorder::new(cfg.prometheus.clone())?);
        let middleware = Middleware::new(cfg.middleware.to_config(recorder.clone()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                recorder,
                middleware,
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn recorder(&self) -> Arc<PrometheusRecorder> {
        Arc::clone(&self.inner.recorder)
    }

    pub fn middleware(&self) -> Middleware {
        self.inner.middleware.clone()
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
