//! # wsengine
//!
//! A web service dispatch engine: declared actions, validated parameters,
//! one error shape. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Providers declare controllers and actions once, at startup. From then on
//! every call goes through the same pipeline:
//!
//! - **Routing**: `/api/system/health(.json)` → controller `api/system`,
//!   action `health`. Only the `json` extension is understood.
//! - **Method enforcement**: POST-only actions refuse everything else.
//! - **Validation**: required parameters, defaults, possible values, and no
//!   parameter the action did not declare.
//! - **Error translation**: every failure becomes
//!   `{"errors":[{"msg":"..."}]}`; keyed messages are localized; unexpected
//!   failures say `"Unexpected"` and nothing more; a caller that hung up gets
//!   nothing and leaves a warning in the log.
//!
//! What the engine leaves to its collaborators: the transport (a hyper
//! adapter ships as [`Server`]), translations ([`I18n`]), and who the caller
//! is ([`CallContext`]).
//!
//! ## Quick start
//!
//! ```rust
//! use wsengine::{CallContext, Context, DefinitionError, Engine, Method, Request, Response};
//!
//! fn system(ctx: &mut Context) -> Result<(), DefinitionError> {
//!     let mut controller = ctx.create_controller("api/system");
//!     let print = controller.create_action("print");
//!     print.create_param("message").set_required(true);
//!     print.create_param("author").set_default_value("-");
//!     print.set_handler(|req, res| {
//!         let text = format!("{} by {}", req.mandatory_param("message")?, req.param_or("author", "nobody")?);
//!         res.write_body(text.as_bytes())
//!     });
//!     controller.done()
//! }
//!
//! let mut engine = Engine::builder().service(system).build();
//! engine.start().unwrap();
//!
//! let request = Request::new(Method::Get, "/api/system/print").with_param("message", "Hello World");
//! let mut response = Response::new();
//! engine.execute(&CallContext::new(), &request, &mut response);
//! assert_eq!(response.body_str(), "Hello World by -");
//!
//! let mut response = Response::new();
//! engine.execute(&CallContext::new(), &Request::new(Method::Get, "/api/system/print"), &mut response);
//! assert_eq!(response.body_str(), r#"{"errors":[{"msg":"The 'message' parameter is missing"}]}"#);
//! ```

mod definition;
mod engine;
mod error;
mod handler;
mod i18n;
mod method;
mod registry;
mod request;
mod response;
mod router;
mod server;
mod status;
mod translator;
mod validator;

pub mod health;

pub use definition::{
    ActionSpec, Context, ControllerSpec, DefinitionError, NewAction, NewController, NewParam,
    ParamSpec, WebService,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Errors, Message, WsError};
pub use handler::Handler;
pub use i18n::{I18n, StaticMessages};
pub use method::{Method, UnknownMethod};
pub use registry::Registry;
pub use request::{CallContext, Request};
pub use response::{ContentType, Response};
pub use router::{ActionPath, Router, SUPPORTED_EXTENSION};
pub use server::Server;
pub use status::Status;
pub use translator::{Translator, UNEXPECTED_MESSAGE};
pub use validator::{ActionRequest, validate};
