//! Test doubles shared by the core integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::cell::{Cell, OnceCell};
use std::sync::Mutex;
use std::time::Duration;

use http::Extensions;

use httpmetrics_core::metrics::{HttpProperties, HttpReqProperties, Recorder};
use httpmetrics_core::middleware::Reporter;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Duration(HttpReqProperties),
    Size(HttpReqProperties, u64),
    Inflight(HttpProperties, i64),
}

/// Recorder that keeps every call in order.
#[derive(Default)]
pub struct RecordingRecorder {
    calls: Mutex<Vec<Call>>,
}

impl RecordingRecorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn durations(&self) -> Vec<HttpReqProperties> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Duration(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn sizes(&self) -> Vec<(HttpReqProperties, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Size(p, n) => Some((p, n)),
                _ => None,
            })
            .collect()
    }

    pub fn inflight(&self) -> Vec<(HttpProperties, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Inflight(p, q) => Some((p, q)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Recorder for RecordingRecorder {
    fn observe_http_request_duration(&self, _: &Extensions, props: &HttpReqProperties, _: Duration) {
        self.push(Call::Duration(props.clone()));
    }

    fn observe_http_response_size(&self, _: &Extensions, props: &HttpReqProperties, size_bytes: u64) {
        self.push(Call::Size(props.clone(), size_bytes));
    }

    fn add_inflight_requests(&self, _: &Extensions, props: &HttpProperties, quantity: i64) {
        self.push(Call::Inflight(props.clone(), quantity));
    }
}

/// Reporter whose response side is filled in by the wrapped operation.
pub struct FakeReporter {
    pub method: String,
    pub path: OnceCell<String>,
    pub status: Cell<u16>,
    pub bytes: Cell<u64>,
    pub labels: Option<Vec<String>>,
    pub ctx: Extensions,
}

impl FakeReporter {
    pub fn new(method: &str, path: &str) -> Self {
        let rep = Self::unrouted(method);
        if !path.is_empty() {
            rep.route(path);
        }
        rep
    }

    /// Reporter whose path is only known once routing happened.
    pub fn unrouted(method: &str) -> Self {
        Self {
            method: method.to_string(),
            path: OnceCell::new(),
            status: Cell::new(200),
            bytes: Cell::new(0),
            labels: None,
            ctx: Extensions::new(),
        }
    }

    pub fn route(&self, path: &str) {
        self.path.set(path.to_string()).unwrap();
    }

    pub fn respond(&self, status: u16, bytes: u64) {
        self.status.set(status);
        self.bytes.set(bytes);
    }
}

impl Reporter for FakeReporter {
    fn method(&self) -> &str {
        &self.method
    }

    fn context(&self) -> &Extensions {
        &self.ctx
    }

    fn url_path(&self) -> &str {
        self.path.get().map(String::as_str).unwrap_or("")
    }

    fn status_code(&self) -> u16 {
        self.status.get()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes.get()
    }

    fn custom_labels(&self) -> Vec<String> {
        self.labels.clone().unwrap_or_default()
    }
}
