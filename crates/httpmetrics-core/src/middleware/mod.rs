//! Measurement procedure shared by every adapter.
//!
//! An adapter exposes one request/response exchange as a [`Reporter`] and
//! either wraps a synchronous operation with [`Middleware::measure`] or, when
//! the handler is asynchronous, brackets it with [`Middleware::start`] and
//! [`Measurement::finish`].
//!
//! - in-flight: `+1` before the handler, `-1` when the [`Measurement`] is
//!   dropped, whichever way that happens
//! - duration/size: observed once, after the handler returned
//! - handler id: caller supplied, or the URL path; resolved again after the
//!   handler when the first attempt was empty

pub mod handler;
pub mod interceptor;

use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use http::Extensions;

use crate::metrics::{Dummy, HttpProperties, HttpReqProperties, Recorder};

pub use handler::{Handler, RequestReporter, ResponseBuffer};
pub use interceptor::{Connection, Flusher, Hijacker, ResponseInterceptor, ResponseWriter};

/// Middleware configuration.
#[derive(Clone)]
pub struct Config {
    /// Metrics backend. Defaults to [`Dummy`].
    pub recorder: Arc<dyn Recorder>,
    /// Constant `service` label for every metric of this instance.
    pub service: String,
    /// Collapse status codes to their class (`2xx`, `4xx`...).
    pub grouped_status: bool,
    pub disable_measure_size: bool,
    pub disable_measure_inflight: bool,
    /// Paths excluded from duration and size (in-flight is still counted).
    pub ignored_paths: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recorder: Arc::new(Dummy),
            service: String::new(),
            grouped_status: false,
            disable_measure_size: false,
            disable_measure_inflight: false,
            ignored_paths: HashSet::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("service", &self.service)
            .field("grouped_status", &self.grouped_status)
            .field("disable_measure_size", &self.disable_measure_size)
            .field("disable_measure_inflight", &self.disable_measure_inflight)
            .field("ignored_paths", &self.ignored_paths)
            .finish_non_exhaustive()
    }
}

/// View over one request/response exchange, implemented by adapters.
pub trait Reporter {
    fn method(&self) -> &str;
    fn context(&self) -> &Extensions;
    fn url_path(&self) -> &str;
    fn status_code(&self) -> u16;
    fn bytes_written(&self) -> u64;

    /// Per-request values for the recorder's extra labels.
    fn custom_labels(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Request extension carrying per-request custom label values.
///
/// Adapters shipped with this crate read it from the request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomLabels(pub Vec<String>);

/// Measurement factory. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Middleware {
    cfg: Arc<Config>,
}

impl Default for Middleware {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Middleware {
    pub fn new(cfg: Config) -> Self {
        tracing::debug!(
            service = %cfg.service,
            grouped_status = cfg.grouped_status,
            measure_size = !cfg.disable_measure_size,
            measure_inflight = !cfg.disable_measure_inflight,
            ignored_paths = cfg.ignored_paths.len(),
            "http metrics middleware built"
        );
        Self { cfg: Arc::new(cfg) }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Measures `next` as the handling of the exchange seen by `reporter`.
    ///
    /// `handler_id` is used as the `id` label; an empty id falls back to the
    /// reporter's URL path. A panic in `next` is not caught: it unwinds
    /// through here after releasing the in-flight slot, and no duration or
    /// size is recorded for that exchange.
    pub fn measure<R, F, T>(&self, handler_id: &str, reporter: &R, next: F) -> T
    where
        R: Reporter + ?Sized,
        F: FnOnce() -> T,
    {
        let measurement = self.start(handler_id, reporter);
        let out = next();
        measurement.finish(reporter);
        out
    }

    /// Opens a measurement: resolves the handler id, bumps the in-flight
    /// gauge and starts the timer. The request context is borrowed from
    /// `reporter` until the measurement ends.
    pub fn start<'a, R>(&self, handler_id: &str, reporter: &'a R) -> Measurement<'a>
    where
        R: Reporter + ?Sized,
    {
        self.open(handler_id, reporter, MeasureContext::Borrowed(reporter.context()))
    }

    /// Like [`start`](Self::start), for measurements that outlive the
    /// reporter, e.g. while a response body is still being streamed. `ctx`
    /// is the request context, shared with the adapter instead of copied.
    pub fn start_shared<R>(
        &self,
        handler_id: &str,
        reporter: &R,
        ctx: Arc<Extensions>,
    ) -> Measurement<'static>
    where
        R: Reporter + ?Sized,
    {
        self.open(handler_id, reporter, MeasureContext::Shared(ctx))
    }

    fn open<'a, R>(&self, handler_id: &str, reporter: &R, ctx: MeasureContext<'a>) -> Measurement<'a>
    where
        R: Reporter + ?Sized,
    {
        let id = resolve_handler_id(handler_id, reporter);
        let custom_labels = reporter.custom_labels();

        let inflight = if self.cfg.disable_measure_inflight {
            None
        } else {
            let props = HttpProperties {
                service: self.cfg.service.clone(),
                id: id.clone(),
                custom_labels: custom_labels.clone(),
            };
            self.cfg.recorder.add_inflight_requests(&ctx, &props, 1);
            Some(props)
        };

        Measurement {
            cfg: Arc::clone(&self.cfg),
            ctx,
            id,
            custom_labels,
            inflight,
            start: Instant::now(),
        }
    }
}

enum MeasureContext<'a> {
    Borrowed(&'a Extensions),
    Shared(Arc<Extensions>),
}

impl Deref for MeasureContext<'_> {
    type Target = Extensions;

    fn deref(&self) -> &Extensions {
        match self {
            MeasureContext::Borrowed(ctx) => ctx,
            MeasureContext::Shared(ctx) => ctx,
        }
    }
}

/// One open measurement. Dropping it without [`finish`](Self::finish)
/// releases the in-flight slot and records nothing else.
#[must_use = "a measurement records duration and size only when finished"]
pub struct Measurement<'a> {
    cfg: Arc<Config>,
    ctx: MeasureContext<'a>,
    id: String,
    custom_labels: Vec<String>,
    /// Labels of the in-flight increment, released on drop.
    inflight: Option<HttpProperties>,
    start: Instant,
}

impl Measurement<'_> {
    /// Request context every observation of this measurement is made with.
    pub fn context(&self) -> &Extensions {
        &self.ctx
    }

    /// Records duration and size for the exchange, then releases the
    /// in-flight slot.
    pub fn finish<R>(mut self, reporter: &R)
    where
        R: Reporter + ?Sized,
    {
        let duration = self.start.elapsed();

        let path = reporter.url_path();
        if self.cfg.ignored_paths.contains(path) {
            tracing::trace!(path, "ignored path, skipping duration and size");
            return;
        }

        let status = reporter.status_code();
        let code = if self.cfg.grouped_status {
            format!("{}xx", status / 100)
        } else {
            status.to_string()
        };

        // Resolved again: routing may have filled the path in meanwhile.
        let id = if self.id.is_empty() {
            path.to_string()
        } else {
            mem::take(&mut self.id)
        };

        let props = HttpReqProperties {
            service: self.cfg.service.clone(),
            id,
            method: reporter.method().to_string(),
            code,
            custom_labels: mem::take(&mut self.custom_labels),
        };

        let recorder = self.cfg.recorder.as_ref();
        recorder.observe_http_request_duration(&self.ctx, &props, duration);
        if !self.cfg.disable_measure_size {
            recorder.observe_http_response_size(&self.ctx, &props, reporter.bytes_written());
        }

        tracing::trace!(
            handler = %props.id,
            method = %props.method,
            code = %props.code,
            elapsed_us = duration.as_micros() as u64,
            "request measured"
        );
    }
}

impl Drop for Measurement<'_> {
    fn drop(&mut self) {
        if let Some(props) = self.inflight.take() {
            self.cfg.recorder.add_inflight_requests(&self.ctx, &props, -1);
        }
    }
}

fn resolve_handler_id<R: Reporter + ?Sized>(handler_id: &str, reporter: &R) -> String {
    if handler_id.is_empty() {
        reporter.url_path().to_string()
    } else {
        handler_id.to_string()
    }
}
