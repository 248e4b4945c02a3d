//! Incoming request type and the per-call context.

use std::collections::HashMap;

use crate::method::Method;

/// An incoming request, as handed over by the transport.
///
/// The engine only reads it. Parameters are already decoded: query string,
/// form body, whatever the transport collected.
///
/// ```rust
/// use wsengine::{Method, Request};
///
/// let req = Request::new(Method::Get, "/api/system/print")
///     .with_param("message", "Hello World");
/// assert_eq!(req.param("message"), Some("Hello World"));
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    path: String,
    params: HashMap<String, String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Sets a parameter. A repeated key keeps the last value.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Raw parameter as supplied by the caller, without defaults applied.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Caller context threaded through one [`Engine::execute`](crate::Engine::execute) call.
///
/// Supplied by whatever knows who is calling (session, auth layer, the
/// server's `Accept-Language` sniffing). The engine uses the locale to render
/// translated error messages; handlers can read it too.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CallContext {
    locale: Option<String>,
    login: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Active locale tag, `"en"` when none was supplied.
    pub fn locale(&self) -> &str {
        self.locale.as_deref().unwrap_or("en")
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }
}
