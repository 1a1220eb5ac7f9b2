//! Response writer decoration.
//!
//! [`ResponseInterceptor`] sits between a handler and the real
//! [`ResponseWriter`]. Bytes and status pass through untouched; the
//! interceptor only keeps the last status written and the number of body
//! bytes the underlying writer accepted.
//!
//! Flushing and hijacking are optional capabilities. A writer advertises them
//! through [`ResponseWriter::as_flusher`] / [`ResponseWriter::as_hijacker`];
//! the interceptor forwards those queries so that wrapping a writer never
//! hides a capability, and reports [`HttpMetricsError::Unsupported`] when the
//! wrapped writer lacks one.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::error::{Capability, HttpMetricsError, Result};

/// Minimal response writing primitive a host exposes to handlers.
pub trait ResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }
}

/// Pushes buffered response data to the client.
pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// Takes over the underlying connection (protocol upgrades).
pub trait Hijacker {
    fn hijack(&mut self) -> io::Result<Box<dyn Connection>>;
}

/// Raw bidirectional stream handed out by [`Hijacker::hijack`].
pub trait Connection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Connection for T {}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        (**self).write_header(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        (**self).as_flusher()
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        (**self).as_hijacker()
    }
}

/// Records status and body size of everything written through it.
#[derive(Debug)]
pub struct ResponseInterceptor<W> {
    inner: W,
    status: StatusCode,
    bytes_written: u64,
}

impl<W: ResponseWriter> ResponseInterceptor<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            status: StatusCode::OK,
            bytes_written: 0,
        }
    }

    /// Last status written, `200 OK` when the handler never set one.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        match self.inner.as_flusher() {
            Some(f) => f.flush().map_err(HttpMetricsError::from),
            None => Err(HttpMetricsError::Unsupported(Capability::Flush)),
        }
    }

    /// Hijacks the underlying connection. Bytes written on the returned
    /// connection are not counted.
    pub fn hijack(&mut self) -> Result<Box<dyn Connection>> {
        match self.inner.as_hijacker() {
            Some(h) => h.hijack().map_err(HttpMetricsError::from),
            None => Err(HttpMetricsError::Unsupported(Capability::Hijack)),
        }
    }
}

impl<W: ResponseWriter> ResponseWriter for ResponseInterceptor<W> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = status;
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        self.inner.as_flusher()
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        self.inner.as_hijacker()
    }
}
