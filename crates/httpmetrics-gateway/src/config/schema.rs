use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;

use httpmetrics_core::error::{HttpMetricsError, Result};
use httpmetrics_core::metrics::Recorder;
use httpmetrics_core::middleware;

use crate::obs::PrometheusConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub middleware: MiddlewareSection,

    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HttpMetricsError::InvalidConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.prometheus.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Address of the measured application routes.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Address of `/metrics`, `/healthz` and `/readyz`.
    #[serde(default = "default_metrics_listen")]
    pub metrics_listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_listen: default_metrics_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        let listen = self.listen_addr()?;
        let metrics = self.metrics_addr()?;
        if listen == metrics {
            return Err(HttpMetricsError::InvalidConfig(
                "server.listen and server.metrics_listen must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("server.listen", &self.listen)
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        parse_addr("server.metrics_listen", &self.metrics_listen)
    }
}

fn parse_addr(field: &str, s: &str) -> Result<SocketAddr> {
    s.parse().map_err(|e| {
        HttpMetricsError::InvalidConfig(format!("{field} must be a valid socket address: {e}"))
    })
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_metrics_listen() -> String {
    "0.0.0.0:8081".into()
}

/// Measurement options; mirrors `middleware::Config` minus the recorder.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareSection {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub grouped_status: bool,
    #[serde(default)]
    pub disable_measure_size: bool,
    #[serde(default)]
    pub disable_measure_inflight: bool,
    #[serde(default)]
    pub ignored_paths: Vec<String>,
}

impl MiddlewareSection {
    pub fn to_config(&self, recorder: Arc<dyn Recorder>) -> middleware::Config {
        middleware::Config {
            recorder,
            service: self.service.clone(),
            grouped_status: self.grouped_status,
            disable_measure_size: self.disable_measure_size,
            disable_measure_inflight: self.disable_measure_inflight,
            ignored_paths: self.ignored_paths.iter().cloned().collect(),
        }
    }
}
