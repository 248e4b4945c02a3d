//! HTTP transport and graceful shutdown.
//!
//! The engine is transport-agnostic; this module is the hyper adapter that
//! feeds it. Per request it:
//!
//! 1. collects query-string parameters, plus form-encoded body parameters,
//! 2. takes the caller's locale from the first `Accept-Language` tag,
//! 3. runs [`Engine::execute`] on tokio's blocking pool (handlers may block),
//! 4. sends the buffered [`Response`], or drops the connection if the call
//!    was aborted.
//!
//! # Graceful shutdown and Kubernetes
//!
//! On **SIGTERM** or Ctrl-C the server stops accepting connections, lets
//! every in-flight connection finish, stops the engine and returns from
//! [`Server::serve`]. Set `terminationGracePeriodSeconds` longer than your
//! slowest action.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use url::form_urlencoded;

use crate::engine::Engine;
use crate::error::Error;
use crate::method::Method;
use crate::request::{CallContext, Request};
use crate::response::Response;
use crate::status::Status;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use wsengine::Server;
    ///
    /// assert!(Server::bind("0.0.0.0:9000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress { addr: addr.to_owned() })?;
        Ok(Self { addr })
    }

    /// Starts `engine`, then accepts connections and dispatches them through
    /// it until a shutdown signal arrives.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, mut engine: Engine) -> Result<(), Error> {
        engine.start()?;
        let listener = TcpListener::bind(self.addr).await?;
        let engine = Arc::new(engine);

        info!(addr = %self.addr, "wsengine listening");

        // Every spawned connection task, so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first: a SIGTERM stops accepting even if more
                // connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let engine = Arc::clone(&engine);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| dispatch(Arc::clone(&engine), req));

                        // HTTP/1.1 and HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            // Aborted calls end up here too; the engine
                            // already logged them.
                            debug!(peer = %remote_addr, "connection closed: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        if let Ok(mut engine) = Arc::try_unwrap(engine) {
            engine.stop();
        }
        info!("wsengine stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Turns one HTTP request into one engine call.
///
/// An `Err` makes hyper drop the connection, which is all that is left to do
/// for a caller that went away.
async fn dispatch<B>(
    engine: Arc<Engine>,
    req: http::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Error>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        return Ok(status_only(Status::MethodNotAllowed));
    };

    let (parts, body) = req.into_parts();
    let body = body.collect().await.map_err(io::Error::other)?.to_bytes();

    let mut request = Request::new(method, parts.uri.path());
    if let Some(query) = parts.uri.query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            request = request.with_param(key, value);
        }
    }
    let is_form = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));
    if is_form {
        for (key, value) in form_urlencoded::parse(&body) {
            request = request.with_param(key, value);
        }
    }
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    let request = request.with_body(body.to_vec());
    let ctx = call_context(&request);

    let response = tokio::task::spawn_blocking(move || {
        let mut response = Response::new();
        engine.execute(&ctx, &request, &mut response);
        response
    })
    .await
    .map_err(io::Error::other)?;

    if response.status().is_none() {
        return Err(Error::ClientAborted);
    }
    Ok(response.into_http())
}

fn call_context(request: &Request) -> CallContext {
    let locale = request
        .header("accept-language")
        .and_then(|v| v.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
        .filter(|tag| !tag.is_empty() && *tag != "*");
    match locale {
        Some(tag) => CallContext::new().with_locale(tag),
        None => CallContext::new(),
    }
}

fn status_only(status: Status) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status.into();
    response
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Context, DefinitionError};

    fn engine() -> Arc<Engine> {
        let echo = |ctx: &mut Context| -> Result<(), DefinitionError> {
            let mut controller = ctx.create_controller("api/echo");
            let say = controller.create_action("say");
            say.create_param("text").set_required(true);
            say.set_post(true).set_handler(|req, res| {
                let text = req.mandatory_param("text")?;
                res.set_header("x-locale", req.context().locale());
                res.write_body(text.as_bytes())
            });
            controller.done()
        };
        let mut engine = Engine::builder().service(echo).build();
        engine.start().unwrap();
        Arc::new(engine)
    }

    fn post(uri: &str, body: &'static str) -> http::Request<Full<Bytes>> {
        http::Request::post(uri)
            .header("content-type", FORM_CONTENT_TYPE)
            .header("accept-language", "fr-CA,fr;q=0.9")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_of(response: http::Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn form_body_becomes_parameters() {
        let response = dispatch(engine(), post("/api/echo/say", "text=hello+world")).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.headers()["x-locale"], "fr-CA");
        assert_eq!(body_of(response).await, "hello world");
    }

    #[tokio::test]
    async fn query_string_becomes_parameters() {
        let response = dispatch(engine(), post("/api/echo/say.json?text=%C3%A9t%C3%A9", "")).await.unwrap();
        assert_eq!(body_of(response).await, "été");
    }

    #[tokio::test]
    async fn errors_are_json() {
        let response = dispatch(engine(), post("/api/echo/say", "")).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_of(response).await, r#"{"errors":[{"msg":"The 'text' parameter is missing"}]}"#);
    }

    #[tokio::test]
    async fn unknown_method_is_405() {
        let req = http::Request::builder()
            .method("PURGE")
            .uri("/api/echo/say")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = dispatch(engine(), req).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::METHOD_NOT_ALLOWED);
    }
}
