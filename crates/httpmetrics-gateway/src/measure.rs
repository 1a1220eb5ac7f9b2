//! axum adapter for the measurement middleware.
//!
//! Use with `axum::middleware::from_fn_with_state`:
//! ```ignore
//! Router::new()
//!     .route("/users/:id", get(user))
//!     .route_layer(from_fn_with_state(Measure::by_path(mw), measure::track))
//! ```
//! Installed with `route_layer`, the handler id falls back to the matched
//! route template (`/users/:id`) instead of the raw path, which keeps label
//! cardinality bounded. Installed with `layer`, routing has not run yet and
//! the raw URI path is used.
//!
//! The measurement stays open until the response body has been sent: the
//! body is wrapped so every data frame handed to the server is counted, and
//! duration and size are recorded once the body ends or is dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{Extensions, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

use httpmetrics_core::middleware::{CustomLabels, Measurement, Middleware, Reporter};

/// Middleware state: which middleware measures, under which handler id.
#[derive(Clone, Debug)]
pub struct Measure {
    middleware: Middleware,
    handler_id: Arc<str>,
}

impl Measure {
    pub fn new(middleware: Middleware, handler_id: impl Into<Arc<str>>) -> Self {
        Self {
            middleware,
            handler_id: handler_id.into(),
        }
    }

    /// Label requests with their route (or path) instead of a fixed id.
    pub fn by_path(middleware: Middleware) -> Self {
        Self::new(middleware, "")
    }
}

/// Reporter over an axum exchange. Response fields are filled in as the
/// response is produced and streamed.
struct AxumReporter {
    method: Method,
    path: String,
    /// Shared with the open measurement.
    extensions: Arc<Extensions>,
    custom_labels: Vec<String>,
    status: StatusCode,
    bytes_written: u64,
}

impl AxumReporter {
    fn from_request(req: &Request) -> Self {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|mp| mp.as_str().to_owned())
            .unwrap_or_else(|| req.uri().path().to_owned());
        let custom_labels = req
            .extensions()
            .get::<CustomLabels>()
            .map(|l| l.0.clone())
            .unwrap_or_default();

        Self {
            method: req.method().clone(),
            path,
            extensions: Arc::new(req.extensions().clone()),
            custom_labels,
            status: StatusCode::OK,
            bytes_written: 0,
        }
    }
}

impl Reporter for AxumReporter {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn context(&self) -> &Extensions {
        &self.extensions
    }

    fn url_path(&self) -> &str {
        &self.path
    }

    fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn custom_labels(&self) -> Vec<String> {
        self.custom_labels.clone()
    }
}

/// Response body that counts the bytes it yields and closes the measurement
/// at end of stream, on a body error, or when dropped unfinished.
struct MeasuredBody {
    inner: Body,
    reporter: AxumReporter,
    measurement: Option<Measurement<'static>>,
}

impl MeasuredBody {
    fn finish(&mut self) {
        if let Some(measurement) = self.measurement.take() {
            measurement.finish(&self.reporter);
        }
    }
}

impl HttpBody for MeasuredBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.reporter.bytes_written += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.finish();
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for MeasuredBody {
    fn drop(&mut self) {
        // Client went away mid-body: record what was sent so far.
        self.finish();
    }
}

/// Measures the request and passes the response through untouched.
///
/// If the request future is dropped before the handler returns (client went
/// away), only the in-flight slot is released.
pub async fn track(State(measure): State<Measure>, req: Request, next: Next) -> Response {
    let mut reporter = AxumReporter::from_request(&req);
    let measurement = measure.middleware.start_shared(
        &measure.handler_id,
        &reporter,
        Arc::clone(&reporter.extensions),
    );

    let response = next.run(req).await;
    reporter.status = response.status();

    let (parts, body) = response.into_parts();
    if body.is_end_stream() {
        // Empty body: nothing left to count.
        measurement.finish(&reporter);
        return Response::from_parts(parts, body);
    }

    let body = MeasuredBody {
        inner: body,
        reporter,
        measurement: Some(measurement),
    };
    Response::from_parts(parts, Body::new(body))
}
