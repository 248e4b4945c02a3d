//! The dispatch engine.
//!
//! [`Engine::execute`] is the only entry point per call:
//!
//! ```text
//! Router::resolve ─► validate ─► handler ─► finalize
//!        │              │           │
//!        └──────────────┴───────────┴─► Translator::write_error
//! ```
//!
//! Nothing escapes `execute`: every failure ends up as a JSON error body, or,
//! when the client is gone, as nothing at all plus a warning in the log.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::definition::{ControllerSpec, DefinitionError, WebService};
use crate::error::{Error, WsError};
use crate::i18n::I18n;
use crate::registry::Registry;
use crate::request::{CallContext, Request};
use crate::response::Response;
use crate::router::Router;
use crate::translator::Translator;
use crate::validator::{self, ActionRequest};

/// Web service engine: owns the definition providers and, once started, the
/// registry built from them.
///
/// `Engine` is `Send + Sync`; once started, an `Arc<Engine>` serves
/// concurrent callers without locking.
///
/// ```rust
/// use wsengine::{CallContext, Context, DefinitionError, Engine, Method, Request, Response};
///
/// let system = |ctx: &mut Context| -> Result<(), DefinitionError> {
///     let mut controller = ctx.create_controller("api/system");
///     controller
///         .create_action("ping")
///         .set_post(true)
///         .set_handler(|_req, res| res.write_body(b"pong"));
///     controller.done()
/// };
///
/// let mut engine = Engine::builder().service(system).build();
/// engine.start().unwrap();
///
/// let mut response = Response::new();
/// engine.execute(&CallContext::new(), &Request::new(Method::Post, "/api/system/ping"), &mut response);
/// assert_eq!(response.body(), b"pong");
/// ```
pub struct Engine {
    services: Vec<Box<dyn WebService>>,
    i18n: Option<Arc<dyn I18n>>,
    registry: Option<Registry>,
    failure: Option<DefinitionError>,
    empty: Registry,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder { services: Vec::new(), i18n: None }
    }

    /// Builds the registry, invoking every provider exactly once.
    ///
    /// Fails on the first broken definition; the engine then stays stopped
    /// and every later `start` returns the same error without running the
    /// providers again. Starting a started engine does nothing.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.registry.is_some() {
            debug!("web service engine already started");
            return Ok(());
        }
        if let Some(err) = &self.failure {
            return Err(err.clone().into());
        }
        let registry = match Registry::build(self.services.iter().map(|s| &**s)) {
            Ok(registry) => registry,
            Err(err) => {
                error!(error = %err, "web service engine failed to start");
                self.failure = Some(err.clone());
                return Err(err.into());
            }
        };
        info!(controllers = registry.len(), "web service engine started");
        self.registry = Some(registry);
        Ok(())
    }

    /// Drops the registry. Lookups and calls behave as if nothing was defined.
    pub fn stop(&mut self) {
        if self.registry.take().is_some() {
            info!("web service engine stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.registry.is_some()
    }

    /// All controllers, sorted by path. Empty while stopped.
    pub fn controllers(&self) -> Vec<&ControllerSpec> {
        self.registry().controllers()
    }

    pub fn controller(&self, path: &str) -> Option<&ControllerSpec> {
        self.registry().controller(path)
    }

    fn registry(&self) -> &Registry {
        self.registry.as_ref().unwrap_or(&self.empty)
    }

    /// Dispatches one call and leaves the final state in `response`.
    pub fn execute(&self, ctx: &CallContext, request: &Request, response: &mut Response) {
        match self.dispatch(ctx, request, response) {
            Ok(()) => self.finish(request, response),
            Err(err) => self.fail(ctx, request, err, response),
        }
    }

    fn dispatch(
        &self,
        ctx: &CallContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), WsError> {
        let action = Router::new(self.registry()).resolve(request.method(), request.path())?;
        validator::validate(action, request)?;

        let view = ActionRequest::new(action, request, ctx);
        let handler = action.handler();
        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(&view, response))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(WsError::Unexpected(anyhow!(
                "handler of {} panicked: {}",
                action.path(),
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn finish(&self, request: &Request, response: &mut Response) {
        if response.is_no_content() {
            response.finish_no_content();
        } else {
            response.finish_ok();
        }
        if let Err(err) = response.flush() {
            let err = WsError::from(err);
            if err.is_client_abort() {
                abandon(request, &err, response);
            } else {
                error!(path = request.path(), error = ?err, "failed to flush response");
            }
        }
    }

    fn fail(&self, ctx: &CallContext, request: &Request, err: WsError, response: &mut Response) {
        if err.is_client_abort() {
            abandon(request, &err, response);
            return;
        }
        match &err {
            WsError::BadRequest(errors) => {
                debug!(path = request.path(), reason = %errors, "bad request");
            }
            WsError::Bug(message) => {
                error!(path = request.path(), "{message}");
            }
            WsError::Unexpected(_) | WsError::ClientAbort(_) => {
                error!(path = request.path(), error = ?err, "fail to process request");
            }
        }

        response.reset();
        let i18n = self.i18n.as_deref().map(|i18n| i18n as &dyn I18n);
        let translator = Translator::new(i18n, ctx.locale());
        if let Err(write_err) = translator.write_error(&err, response) {
            if write_err.is_client_abort() {
                abandon(request, &write_err, response);
            } else {
                error!(path = request.path(), error = ?write_err, "failed to write error response");
            }
        }
    }
}

/// The caller disconnected: nothing more is written, nobody is told.
fn abandon(request: &Request, err: &WsError, response: &mut Response) {
    warn!(path = request.path(), error = %err, "client aborted the request");
    response.abandon();
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Chained configuration for an [`Engine`].
pub struct EngineBuilder {
    services: Vec<Box<dyn WebService>>,
    i18n: Option<Arc<dyn I18n>>,
}

impl EngineBuilder {
    /// Adds a definition provider. Providers run in the order added.
    pub fn service(mut self, service: impl WebService) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// Message translator for keyed error messages. Without one, keys are
    /// shown as-is.
    pub fn i18n(mut self, i18n: impl I18n + 'static) -> Self {
        self.i18n = Some(Arc::new(i18n));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            services: self.services,
            i18n: self.i18n,
            registry: None,
            failure: None,
            empty: Registry::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_test::traced_test;

    use super::*;
    use crate::definition::{Context, DefinitionError};
    use crate::method::Method;

    fn engine() -> Engine {
        let system = |ctx: &mut Context| -> Result<(), DefinitionError> {
            let mut controller = ctx.create_controller("api/system");
            controller.create_action("abort").set_handler(|_req, _res| {
                Err(WsError::unexpected(anyhow::Error::new(io::Error::from(
                    io::ErrorKind::ConnectionAborted,
                ))
                .context("fail!")))
            });
            controller.create_action("stream").set_handler(|_req, res| {
                res.write_body(b"first chunk")?;
                res.write_body(b"second chunk")
            });
            controller.create_action("boom").set_handler(|_req, _res| panic!("kaboom"));
            controller.done()
        };
        let mut engine = Engine::builder().service(system).build();
        engine.start().unwrap();
        engine
    }

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
    #[traced_test]
    fn client_abort_is_silent_but_logged() {
        let engine = engine();
        let mut response = Response::new();
        engine.execute(&CallContext::new(), &Request::new(Method::Get, "/api/system/abort"), &mut response);

        assert!(response.body().is_empty());
        assert_eq!(response.status(), None);
        assert!(logs_contain("client aborted the request"));
    }

    #[test]
    #[traced_test]
    fn hung_up_sink_mid_write() {
        let engine = engine();
        let mut response = Response::streaming(HungUp);
        engine.execute(&CallContext::new(), &Request::new(Method::Get, "/api/system/stream"), &mut response);

        assert!(response.body().is_empty());
        assert_eq!(response.status(), None);
        assert!(logs_contain("client aborted the request"));
    }

    #[test]
    fn panicking_handler_is_an_unexpected_failure() {
        let engine = engine();
        let mut response = Response::new();
        engine.execute(&CallContext::new(), &Request::new(Method::Get, "/api/system/boom"), &mut response);

        assert_eq!(response.status(), Some(crate::Status::InternalServerError));
        assert_eq!(response.body_str(), r#"{"errors":[{"msg":"Unexpected"}]}"#);
    }

    #[test]
    fn start_is_idempotent_and_stop_clears() {
        let mut engine = engine();
        engine.start().unwrap();
        assert_eq!(engine.controllers().len(), 1);

        engine.stop();
        assert!(!engine.is_started());
        assert!(engine.controller("api/system").is_none());
    }

    #[test]
    fn broken_definitions_abort_start() {
        let forgetful = |ctx: &mut Context| -> Result<(), DefinitionError> {
            let mut controller = ctx.create_controller("api/forgetful");
            controller.create_action("x").set_handler(|_req, _res| Ok(()));
            Ok(())
        };
        let mut engine = Engine::builder().service(forgetful).build();

        let err = engine.start().unwrap_err();
        assert!(matches!(err, Error::Definition(DefinitionError::NotSealed { .. })));
        assert!(!engine.is_started());
    }

    #[test]
    fn failed_start_does_not_rerun_providers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let duplicate = move |ctx: &mut Context| -> Result<(), DefinitionError> {
            counted.fetch_add(1, Ordering::SeqCst);
            for _ in 0..2 {
                let mut controller = ctx.create_controller("api/twice");
                controller.create_action("x").set_handler(|_req, _res| Ok(()));
                controller.done()?;
            }
            Ok(())
        };
        let mut engine = Engine::builder().service(duplicate).build();

        let first = engine.start().unwrap_err();
        let second = engine.start().unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!engine.is_started());
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();

        let engine = Arc::new(engine());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    let mut response = Response::new();
                    engine.execute(&CallContext::new(), &Request::new(Method::Get, "/api/system/stream"), &mut response);
                    assert_eq!(response.body_str(), "first chunksecond chunk");
                });
            }
        });
    }
}
