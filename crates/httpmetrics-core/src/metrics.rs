//! Recorder contract between the measurement procedure and metrics backends.

use std::time::Duration;

use http::Extensions;

/// Labels attached to request duration and response size observations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpReqProperties {
    /// Logical service name; may be empty.
    pub service: String,
    /// Handler identifier (caller supplied or the URL path).
    pub id: String,
    /// HTTP method, verbatim.
    pub method: String,
    /// Status code, verbatim (`"404"`) or grouped (`"4xx"`).
    pub code: String,
    /// Positional values for the recorder's extra label names.
    pub custom_labels: Vec<String>,
}

/// Labels attached to the in-flight gauge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpProperties {
    pub service: String,
    pub id: String,
    pub custom_labels: Vec<String>,
}

/// Records the HTTP metrics produced by the middleware.
///
/// Implementations are called concurrently from every request being served
/// and must not fail the request: a backend that cannot record a value drops
/// it according to its own policy.
///
/// `ctx` is the request's extension map, available to backends that
/// correlate metrics with request scoped data (trace ids, tenants).
pub trait Recorder: Send + Sync {
    /// Measures the duration of an HTTP request.
    fn observe_http_request_duration(
        &self,
        ctx: &Extensions,
        props: &HttpReqProperties,
        duration: Duration,
    );

    /// Measures the size of an HTTP response in bytes.
    fn observe_http_response_size(&self, ctx: &Extensions, props: &HttpReqProperties, size_bytes: u64);

    /// Adds `quantity` (usually `1` or `-1`) to the in-flight requests.
    fn add_inflight_requests(&self, ctx: &Extensions, props: &HttpProperties, quantity: i64);

    /// Pre-registers a duration series so it is exported before the first request.
    fn register_http_request_duration_values(&self, _props: &HttpReqProperties) {}

    /// Pre-registers a response size series so it is exported before the first request.
    fn register_http_response_size_values(&self, _props: &HttpReqProperties) {}

    /// Pre-registers an in-flight series so it is exported before the first request.
    fn register_inflight_requests_values(&self, _props: &HttpProperties) {}
}

/// Recorder that drops everything. Default when nothing is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dummy;

impl Recorder for Dummy {
    fn observe_http_request_duration(&self, _: &Extensions, _: &HttpReqProperties, _: Duration) {}
    fn observe_http_response_size(&self, _: &Extensions, _: &HttpReqProperties, _: u64) {}
    fn add_inflight_requests(&self, _: &Extensions, _: &HttpProperties, _: i64) {}
}
