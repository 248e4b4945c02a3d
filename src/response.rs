//! Outgoing response type.
//!
//! A [`Response`] is created by the transport for one call, handed to
//! [`Engine::execute`](crate::Engine::execute), written by the handler and
//! finalized by the engine. It either buffers the body ([`Response::new`]) or
//! writes straight through to the transport ([`Response::streaming`]), in
//! which case a vanished client shows up as an I/O error on write.

use std::fmt;
use std::io::{self, Write};

use bytes::Bytes;
use http_body_util::Full;
use indexmap::IndexMap;

use crate::error::WsError;
use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Media types a handler can declare for its body.
///
/// JSON is the engine's own encoding: error bodies always use it, and a
/// successful body without an explicit type is assumed to be JSON.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Protobuf,     // application/x-protobuf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
    Zip,          // application/zip
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Protobuf    => "application/x-protobuf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
            Self::Zip         => "application/zip",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing response, owned by exactly one call.
///
/// ```rust
/// use wsengine::Response;
///
/// let mut response = Response::new();
/// response.set_header("Content-Disposition", "attachment; filename=report.zip");
/// response.set_header("Cache-Control", "no-cache");
///
/// let names: Vec<_> = response.header_names().collect();
/// assert_eq!(names, ["Content-Disposition", "Cache-Control"]);
/// ```
pub struct Response {
    status: Option<Status>,
    content_type: Option<ContentType>,
    headers: IndexMap<String, String>,
    body: Vec<u8>,
    sink: Option<Box<dyn Write + Send>>,
    no_content: bool,
}

impl Response {
    /// Response that buffers its body in memory.
    pub fn new() -> Self {
        Self {
            status: None,
            content_type: None,
            headers: IndexMap::new(),
            body: Vec::new(),
            sink: None,
            no_content: false,
        }
    }

    /// Response whose body goes straight to `sink`.
    ///
    /// Nothing is buffered, so [`body`](Self::body) stays empty.
    pub fn streaming(sink: impl Write + Send + 'static) -> Self {
        Self { sink: Some(Box::new(sink)), ..Self::new() }
    }

    /// Appends bytes to the body.
    ///
    /// A disconnect reported by the sink comes back as
    /// [`WsError::ClientAbort`], ready to be returned with `?`.
    pub fn write_body(&mut self, bytes: &[u8]) -> Result<(), WsError> {
        self.write_all(bytes).map_err(WsError::from)
    }

    /// Sets a header. Setting an existing name replaces its value but keeps
    /// its original position.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Header names in the order they were first set.
    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Marks the call as answered with `204 No Content`.
    ///
    /// Whatever was written to the body is dropped when the engine finalizes
    /// the response; headers stay.
    pub fn no_content(&mut self) {
        self.no_content = true;
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = Some(content_type);
    }

    /// Final status, or `None` while unset (and forever, for an aborted call).
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn media_type(&self) -> Option<&'static str> {
        self.content_type.map(ContentType::as_str)
    }

    /// Buffered body bytes. Always empty for a streaming response.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Buffered body as text, lossily decoded.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.is_some()
    }

    // ── Engine side ──────────────────────────────────────────────────────────

    pub(crate) fn is_no_content(&self) -> bool {
        self.no_content
    }

    /// Drops buffered output and any status a failed handler left behind.
    /// Headers survive.
    pub(crate) fn reset(&mut self) {
        self.body.clear();
        self.status = None;
        self.content_type = None;
        self.no_content = false;
    }

    /// The client is gone: keep nothing, write nothing more.
    pub(crate) fn abandon(&mut self) {
        self.reset();
        self.sink = None;
    }

    pub(crate) fn finish_no_content(&mut self) {
        self.body.clear();
        self.content_type = None;
        self.status = Some(Status::NoContent);
    }

    pub(crate) fn finish_ok(&mut self) {
        self.status.get_or_insert(Status::Ok);
        self.content_type.get_or_insert(ContentType::Json);
    }

    /// Converts a buffered response into an `http` response for hyper.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder()
            .status(http::StatusCode::from(self.status.unwrap_or(Status::Ok)));
        if let Some(content_type) = self.content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type.as_str());
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                // A handler set a header the http crate refuses.
                let mut fallback = http::Response::new(Full::new(Bytes::new()));
                *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

impl Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink.as_mut() {
            Some(sink) => sink.write(buf),
            None => self.body.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("streaming", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HungUp;

    impl Write for HungUp {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn headers_keep_insertion_order() {
        let mut response = Response::new();
        response.set_header("b", "1");
        response.set_header("a", "2");
        response.set_header("b", "3");

        assert_eq!(response.header_names().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(response.header("b"), Some("3"));
    }

    #[test]
    fn write_body_buffers() {
        let mut response = Response::new();
        response.write_body(b"po").unwrap();
        response.write_body(b"ng").unwrap();
        assert_eq!(response.body_str(), "pong");
    }

    #[test]
    fn hung_up_sink_is_client_abort() {
        let mut response = Response::streaming(HungUp);
        let err = response.write_body(b"data").unwrap_err();
        assert!(matches!(err, WsError::ClientAbort(_)));
    }

    #[test]
    fn no_content_drops_body_keeps_headers() {
        let mut response = Response::new();
        response.set_header("X-Trace", "abc");
        response.write_body(b"ignored").unwrap();
        response.no_content();
        response.finish_no_content();

        assert!(response.body().is_empty());
        assert_eq!(response.status(), Some(Status::NoContent));
        assert_eq!(response.header("X-Trace"), Some("abc"));
    }

    #[test]
    fn into_http_carries_status_type_and_headers() {
        let mut response = Response::new();
        response.set_header("x-total", "3");
        response.write_body(b"{}").unwrap();
        response.finish_ok();

        let http = response.into_http();
        assert_eq!(http.status(), http::StatusCode::OK);
        assert_eq!(http.headers()["content-type"], "application/json");
        assert_eq!(http.headers()["x-total"], "3");
    }
}
