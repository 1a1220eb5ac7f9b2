//! Synchronous handler adapter over `http` request types.

use std::io;

use http::{Extensions, HeaderMap, Request, Response, StatusCode};

use super::interceptor::{Flusher, ResponseInterceptor, ResponseWriter};
use super::{CustomLabels, Middleware, Reporter};

/// Reporter over an `http::Request` plus the status and byte count observed
/// for its response.
#[derive(Debug)]
pub struct RequestReporter<'a, B> {
    req: &'a Request<B>,
    status: StatusCode,
    bytes_written: u64,
}

impl<'a, B> RequestReporter<'a, B> {
    pub fn new(req: &'a Request<B>, status: StatusCode, bytes_written: u64) -> Self {
        Self {
            req,
            status,
            bytes_written,
        }
    }
}

impl<B> Reporter for RequestReporter<'_, B> {
    fn method(&self) -> &str {
        self.req.method().as_str()
    }

    fn context(&self) -> &Extensions {
        self.req.extensions()
    }

    fn url_path(&self) -> &str {
        self.req.uri().path()
    }

    fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn custom_labels(&self) -> Vec<String> {
        self.req
            .extensions()
            .get::<CustomLabels>()
            .map(|l| l.0.clone())
            .unwrap_or_default()
    }
}

/// Wraps a handler function so every call is measured.
pub struct Handler<H> {
    handler_id: String,
    middleware: Middleware,
    inner: H,
}

impl<H> Handler<H> {
    /// `handler_id` may be empty to label metrics with the request path.
    pub fn new(handler_id: impl Into<String>, middleware: Middleware, inner: H) -> Self {
        Self {
            handler_id: handler_id.into(),
            middleware,
            inner,
        }
    }

    /// Serves `req` through the wrapped handler, writing to `w`.
    pub fn serve<B, W>(&self, w: &mut W, req: &Request<B>)
    where
        W: ResponseWriter + ?Sized,
        H: Fn(&mut dyn ResponseWriter, &Request<B>),
    {
        let mut wi = ResponseInterceptor::new(w);

        let before = RequestReporter::new(req, wi.status_code(), 0);
        let measurement = self.middleware.start(&self.handler_id, &before);
        (self.inner)(&mut wi, req);
        measurement.finish(&RequestReporter::new(req, wi.status_code(), wi.bytes_written()));
    }
}

/// In-memory [`ResponseWriter`]. Supports flushing, not hijacking.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    flushes: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Number of flushes requested by the handler.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Builds the response; status defaults to `200 OK`.
    pub fn into_response(self) -> Response<Vec<u8>> {
        let mut resp = Response::new(self.body);
        *resp.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *resp.headers_mut() = self.headers;
        resp
    }
}

impl ResponseWriter for ResponseBuffer {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Flusher for ResponseBuffer {
    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
