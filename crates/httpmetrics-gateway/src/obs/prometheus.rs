//! Prometheus text-format recorder.
//!
//! Series are keyed by their positional label values and stored as atomics in
//! `DashMap` shards, so recording never takes a global lock. Label names are
//! fixed per metric at construction; rendering sorts them by name the way the
//! reference Prometheus client does, with `le` last on histogram buckets.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use axum::http::Extensions;
use dashmap::DashMap;
use serde::Deserialize;

use httpmetrics_core::error::{HttpMetricsError, Result};
use httpmetrics_core::metrics::{HttpProperties, HttpReqProperties, Recorder};

/// Escape a label value for the text exposition format.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Indices of `names` in lexical order.
fn sorted_order(names: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));
    order
}

/// Formats a sample or bucket bound the way the Go client does
/// (`strconv.FormatFloat(v, 'g', -1, 64)`): shortest digits, exponent form
/// below 1e-4 and from 1e+06 up.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf".into() } else { "-Inf".into() };
    }
    if v == 0.0 {
        return "0".into();
    }

    let sci = format!("{:e}", v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return v.to_string();
    };
    let exp: i32 = match exp.parse() {
        Ok(e) => e,
        Err(_) => return v.to_string(),
    };
    if (-4..6).contains(&exp) {
        v.to_string()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

fn label_pairs(names: &[String], order: &[usize], values: &[String]) -> String {
    order
        .iter()
        .map(|&i| format!("{}=\"{}\"", names[i], escape_label(&values[i])))
        .collect::<Vec<_>>()
        .join(",")
}

pub struct GaugeVec {
    names: Vec<String>,
    order: Vec<usize>,
    map: DashMap<Vec<String>, AtomicI64>,
}

impl GaugeVec {
    fn new(names: Vec<String>) -> Self {
        Self {
            order: sorted_order(&names),
            names,
            map: DashMap::new(),
        }
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, values: Vec<String>, v: i64) {
        let gauge = self.map.entry(values).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    /// Create the series at zero if it does not exist yet.
    pub fn register(&self, values: Vec<String>) {
        self.map.entry(values).or_insert_with(|| AtomicI64::new(0));
    }

    pub fn get(&self, values: &[String]) -> Option<i64> {
        self.map.get(values).map(|g| g.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} gauge", name);

        let mut series: Vec<(Vec<String>, i64)> = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, val) in series {
            let labels = label_pairs(&self.names, &self.order, &key);
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    /// f64 bits.
    sum: AtomicU64,
    /// Cumulative, one per upper bound.
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn add_sum(&self, v: f64) {
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some((f64::from_bits(cur) + v).to_bits())
            });
    }
}

pub struct HistogramVec {
    names: Vec<String>,
    order: Vec<usize>,
    upper_bounds: Vec<f64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    fn new(names: Vec<String>, upper_bounds: Vec<f64>) -> Self {
        Self {
            order: sorted_order(&names),
            names,
            upper_bounds,
            map: DashMap::new(),
        }
    }

    pub fn observe(&self, values: Vec<String>, v: f64) {
        let len = self.upper_bounds.len();
        let hist = self.map.entry(values).or_insert_with(|| AtomicHistogram::new(len));

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.add_sum(v);

        // Cumulative buckets: every bucket whose bound is >= v.
        for (i, &le) in self.upper_bounds.iter().enumerate() {
            if v <= le {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn register(&self, values: Vec<String>) {
        let len = self.upper_bounds.len();
        self.map.entry(values).or_insert_with(|| AtomicHistogram::new(len));
    }

    /// Observation count of one series.
    pub fn count(&self, values: &[String]) -> Option<u64> {
        self.map.get(values).map(|h| h.count.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} histogram", name);

        let mut keys: Vec<Vec<String>> = self.map.iter().map(|r| r.key().clone()).collect();
        keys.sort();

        for key in keys {
            let Some(hist) = self.map.get(&key) else {
                continue;
            };
            let labels = label_pairs(&self.names, &self.order, &key);
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in self.upper_bounds.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(
                    out,
                    "{}_bucket{{{}le=\"{}\"}} {}",
                    name,
                    prefix,
                    format_float(le),
                    count
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = f64::from_bits(hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, format_float(sum));
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

/// Recorder settings. Every field has a default, so an empty YAML mapping is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Metric namespace, prepended as `<prefix>_`. Empty by default.
    pub prefix: String,
    /// Request duration buckets in seconds (5ms to 10s by default).
    pub duration_buckets: Vec<f64>,
    /// Response size buckets in bytes (100B to 1GB by default).
    pub size_buckets: Vec<f64>,
    pub handler_id_label: String,
    pub status_code_label: String,
    pub method_label: String,
    pub service_label: String,
    /// Names for the per-request custom label values, in order.
    pub extra_labels: Vec<String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            duration_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            size_buckets: (0..8).map(|i| 100.0 * 10f64.powi(i)).collect(),
            handler_id_label: "handler".into(),
            status_code_label: "code".into(),
            method_label: "method".into(),
            service_label: "service".into(),
            extra_labels: Vec::new(),
        }
    }
}

impl PrometheusConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.prefix.is_empty() && !is_valid_name(&self.prefix) {
            return Err(HttpMetricsError::InvalidConfig(format!(
                "prometheus.prefix is not a valid metric name: {:?}",
                self.prefix
            )));
        }

        validate_buckets("prometheus.duration_buckets", &self.duration_buckets)?;
        validate_buckets("prometheus.size_buckets", &self.size_buckets)?;

        let mut seen: Vec<&str> = Vec::new();
        for name in self.all_labels() {
            if !is_valid_name(name) || name.starts_with("__") {
                return Err(HttpMetricsError::InvalidConfig(format!(
                    "invalid label name: {:?}",
                    name
                )));
            }
            if name == "le" {
                return Err(HttpMetricsError::InvalidConfig(
                    "label name \"le\" is reserved for histogram buckets".into(),
                ));
            }
            if seen.contains(&name) {
                return Err(HttpMetricsError::InvalidConfig(format!(
                    "duplicate label name: {:?}",
                    name
                )));
            }
            seen.push(name);
        }
        Ok(())
    }

    fn all_labels(&self) -> impl Iterator<Item = &str> {
        [
            self.service_label.as_str(),
            self.handler_id_label.as_str(),
            self.method_label.as_str(),
            self.status_code_label.as_str(),
        ]
        .into_iter()
        .chain(self.extra_labels.iter().map(String::as_str))
    }

    fn metric_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            format!("http_{}", name)
        } else {
            format!("{}_http_{}", self.prefix, name)
        }
    }
}

fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_buckets(field: &str, buckets: &[f64]) -> Result<()> {
    if buckets.is_empty() {
        return Err(HttpMetricsError::InvalidConfig(format!("{} must not be empty", field)));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(HttpMetricsError::InvalidConfig(format!("{} must be finite", field)));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(HttpMetricsError::InvalidConfig(format!(
            "{} must be strictly increasing",
            field
        )));
    }
    Ok(())
}

const DURATION_HELP: &str = "The latency of the HTTP requests.";
const SIZE_HELP: &str = "The size of the HTTP responses.";
const INFLIGHT_HELP: &str = "The number of inflight requests being handled at the same time.";

/// [`Recorder`] backed by an in-process registry, exported with [`render`](Self::render).
pub struct PrometheusRecorder {
    duration_name: String,
    size_name: String,
    inflight_name: String,
    extra_labels: usize,
    request_duration: HistogramVec,
    response_size: HistogramVec,
    inflight: GaugeVec,
}

impl PrometheusRecorder {
    /// Builds the recorder; misconfigured labels or buckets fail here, never
    /// while serving requests.
    pub fn new(cfg: PrometheusConfig) -> Result<Self> {
        cfg.validate()?;

        let req_labels: Vec<String> = cfg.all_labels().map(str::to_string).collect();
        let inflight_labels: Vec<String> = [cfg.service_label.clone(), cfg.handler_id_label.clone()]
            .into_iter()
            .chain(cfg.extra_labels.iter().cloned())
            .collect();

        tracing::debug!(
            prefix = %cfg.prefix,
            extra_labels = ?cfg.extra_labels,
            "prometheus recorder ready"
        );

        Ok(Self {
            duration_name: cfg.metric_name("request_duration_seconds"),
            size_name: cfg.metric_name("response_size_bytes"),
            inflight_name: cfg.metric_name("requests_inflight"),
            extra_labels: cfg.extra_labels.len(),
            request_duration: HistogramVec::new(req_labels.clone(), cfg.duration_buckets),
            response_size: HistogramVec::new(req_labels, cfg.size_buckets),
            inflight: GaugeVec::new(inflight_labels),
        })
    }

    pub fn request_duration(&self) -> &HistogramVec {
        &self.request_duration
    }

    pub fn response_size(&self) -> &HistogramVec {
        &self.response_size
    }

    pub fn inflight(&self) -> &GaugeVec {
        &self.inflight
    }

    /// Render all series in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.request_duration.render(&self.duration_name, DURATION_HELP, &mut out);
        self.inflight.render(&self.inflight_name, INFLIGHT_HELP, &mut out);
        self.response_size.render(&self.size_name, SIZE_HELP, &mut out);
        out
    }

    /// Label values for duration/size series, in construction order.
    pub fn req_label_values(&self, p: &HttpReqProperties) -> Vec<String> {
        let mut values = vec![p.service.clone(), p.id.clone(), p.method.clone(), p.code.clone()];
        self.push_custom(&mut values, &p.custom_labels);
        values
    }

    /// Label values for in-flight series, in construction order.
    pub fn label_values(&self, p: &HttpProperties) -> Vec<String> {
        let mut values = vec![p.service.clone(), p.id.clone()];
        self.push_custom(&mut values, &p.custom_labels);
        values
    }

    // Missing custom values render empty; surplus ones are dropped.
    fn push_custom(&self, values: &mut Vec<String>, custom: &[String]) {
        values.extend(
            (0..self.extra_labels).map(|i| custom.get(i).cloned().unwrap_or_default()),
        );
    }
}

impl Recorder for PrometheusRecorder {
    fn observe_http_request_duration(&self, _: &Extensions, props: &HttpReqProperties, duration: Duration) {
        self.request_duration
            .observe(self.req_label_values(props), duration.as_secs_f64());
    }

    fn observe_http_response_size(&self, _: &Extensions, props: &HttpReqProperties, size_bytes: u64) {
        self.response_size
            .observe(self.req_label_values(props), size_bytes as f64);
    }

    fn add_inflight_requests(&self, _: &Extensions, props: &HttpProperties, quantity: i64) {
        self.inflight.add(self.label_values(props), quantity);
    }

    fn register_http_request_duration_values(&self, props: &HttpReqProperties) {
        self.request_duration.register(self.req_label_values(props));
    }

    fn register_http_response_size_values(&self, props: &HttpReqProperties) {
        self.response_size.register(self.req_label_values(props));
    }

    fn register_inflight_requests_values(&self, props: &HttpProperties) {
        self.inflight.register(self.label_values(props));
    }
}
