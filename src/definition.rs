//! Web service definitions: what a provider declares at startup.
//!
//! Providers implement [`WebService`] and describe their controllers through a
//! [`Context`]. Builders ([`NewController`], [`NewAction`], [`NewParam`]) only
//! exist during [`WebService::define`]; sealing a controller with
//! [`NewController::done`] turns it into an immutable [`ControllerSpec`].
//!
//! ```rust
//! use wsengine::{Context, DefinitionError, WebService};
//!
//! struct IssuesWs;
//!
//! impl WebService for IssuesWs {
//!     fn define(&self, context: &mut Context) -> Result<(), DefinitionError> {
//!         let mut controller = context.create_controller("api/issues");
//!         let search = controller.create_action("search");
//!         search.create_param("severity").set_possible_values(["MINOR", "MAJOR"]);
//!         search.set_handler(|_req, res| res.write_body(b"[]"));
//!         controller.done()
//!     }
//! }
//! ```

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::error::WsError;
use crate::handler::{BoxedHandler, Handler};
use crate::response::Response;
use crate::validator::ActionRequest;

/// Startup-time programming errors in a provider's definitions.
///
/// Any of these aborts [`Engine::start`](crate::Engine::start).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DefinitionError {
    #[error("controller `{path}` was never sealed with done()")]
    NotSealed { path: String },

    #[error("invalid controller path `{path}`: must be non-empty and have no leading or trailing '/'")]
    InvalidPath { path: String },

    #[error("controller `{path}` is defined twice")]
    DuplicateController { path: String },

    #[error("controller `{path}` declares no action")]
    NoAction { path: String },

    #[error("invalid action key `{key}` in `{path}`")]
    InvalidActionKey { path: String, key: String },

    #[error("action `{path}/{key}` is defined twice")]
    DuplicateAction { path: String, key: String },

    #[error("action `{path}/{key}` has no handler")]
    MissingHandler { path: String, key: String },

    #[error("parameter `{param}` of action `{action}` is defined twice")]
    DuplicateParam { action: String, param: String },

    #[error("parameter `{param}` of action `{action}` cannot be both required and defaulted")]
    RequiredWithDefault { action: String, param: String },

    #[error("default value `{value}` of parameter `{param}` of action `{action}` is not a possible value")]
    DefaultNotAllowed { action: String, param: String, value: String },

    #[error("{0}")]
    Provider(String),
}

/// A definition provider, invoked exactly once when the engine starts.
pub trait WebService: Send + Sync + 'static {
    fn define(&self, context: &mut Context) -> Result<(), DefinitionError>;
}

impl<F> WebService for F
where
    F: Fn(&mut Context) -> Result<(), DefinitionError> + Send + Sync + 'static,
{
    fn define(&self, context: &mut Context) -> Result<(), DefinitionError> {
        self(context)
    }
}

// ── Immutable specs ──────────────────────────────────────────────────────────

/// A declared parameter.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParamSpec {
    key: String,
    description: Option<String>,
    required: bool,
    default_value: Option<String>,
    possible_values: Option<IndexSet<String>>,
}

impl ParamSpec {
    pub fn key(&self) -> &str { &self.key }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn is_required(&self) -> bool { self.required }
    pub fn default_value(&self) -> Option<&str> { self.default_value.as_deref() }

    /// Allowed values in declaration order, if restricted.
    pub fn possible_values(&self) -> Option<&IndexSet<String>> {
        self.possible_values.as_ref()
    }
}

/// A declared action. Identified by `(controller_path, key)`.
pub struct ActionSpec {
    key: String,
    controller_path: String,
    description: Option<String>,
    since: Option<String>,
    post: bool,
    params: IndexMap<String, ParamSpec>,
    handler: BoxedHandler,
}

impl ActionSpec {
    pub fn key(&self) -> &str { &self.key }
    pub fn controller_path(&self) -> &str { &self.controller_path }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn since(&self) -> Option<&str> { self.since.as_deref() }
    pub fn is_post(&self) -> bool { self.post }

    /// `controller_path/key`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.controller_path, self.key)
    }

    pub fn param(&self, key: &str) -> Option<&ParamSpec> {
        self.params.get(key)
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.values()
    }

    pub(crate) fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("key", &self.key)
            .field("controller_path", &self.controller_path)
            .field("post", &self.post)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A sealed group of actions under one path prefix.
#[derive(Debug)]
pub struct ControllerSpec {
    path: String,
    description: Option<String>,
    since: Option<String>,
    actions: IndexMap<String, ActionSpec>,
}

impl ControllerSpec {
    pub fn path(&self) -> &str { &self.path }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn since(&self) -> Option<&str> { self.since.as_deref() }

    pub fn action(&self, key: &str) -> Option<&ActionSpec> {
        self.actions.get(key)
    }

    /// Actions in declaration order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values()
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

/// Collects the controllers of every provider while the registry is built.
#[derive(Default)]
pub struct Context {
    sealed: Vec<ControllerSpec>,
    unsealed: Vec<String>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts a controller. It only becomes visible once [`NewController::done`]
    /// succeeds.
    pub fn create_controller(&mut self, path: impl Into<String>) -> NewController<'_> {
        NewController {
            context: self,
            path: path.into(),
            description: None,
            since: None,
            actions: Vec::new(),
            sealed: false,
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<ControllerSpec>, DefinitionError> {
        if let Some(path) = self.unsealed.into_iter().next() {
            return Err(DefinitionError::NotSealed { path });
        }
        Ok(self.sealed)
    }
}

/// Controller under construction.
///
/// Dropping it without calling [`done`](Self::done) fails engine startup.
pub struct NewController<'a> {
    context: &'a mut Context,
    path: String,
    description: Option<String>,
    since: Option<String>,
    actions: Vec<NewAction>,
    sealed: bool,
}

impl NewController<'_> {
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_since(&mut self, version: impl Into<String>) -> &mut Self {
        self.since = Some(version.into());
        self
    }

    pub fn create_action(&mut self, key: impl Into<String>) -> &mut NewAction {
        self.actions.push(NewAction::new(key.into()));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    /// Seals the controller and registers it with the context.
    pub fn done(mut self) -> Result<(), DefinitionError> {
        self.sealed = true;
        let path = self.path.clone();
        if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
            return Err(DefinitionError::InvalidPath { path });
        }
        if self.context.sealed.iter().any(|c| c.path == path) {
            return Err(DefinitionError::DuplicateController { path });
        }
        if self.actions.is_empty() {
            return Err(DefinitionError::NoAction { path });
        }

        let mut actions = IndexMap::with_capacity(self.actions.len());
        for action in std::mem::take(&mut self.actions) {
            let spec = action.build(&path)?;
            if actions.contains_key(&spec.key) {
                return Err(DefinitionError::DuplicateAction { path, key: spec.key });
            }
            actions.insert(spec.key.clone(), spec);
        }

        let controller = ControllerSpec {
            path,
            description: self.description.take(),
            since: self.since.take(),
            actions,
        };
        self.context.sealed.push(controller);
        Ok(())
    }
}

impl Drop for NewController<'_> {
    fn drop(&mut self) {
        if !self.sealed {
            self.context.unsealed.push(std::mem::take(&mut self.path));
        }
    }
}

/// Action under construction.
pub struct NewAction {
    key: String,
    description: Option<String>,
    since: Option<String>,
    post: bool,
    params: Vec<NewParam>,
    handler: Option<BoxedHandler>,
}

impl NewAction {
    fn new(key: String) -> Self {
        Self { key, description: None, since: None, post: false, params: Vec::new(), handler: None }
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_since(&mut self, version: impl Into<String>) -> &mut Self {
        self.since = Some(version.into());
        self
    }

    /// Requires callers to use `POST`.
    pub fn set_post(&mut self, post: bool) -> &mut Self {
        self.post = post;
        self
    }

    pub fn set_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&ActionRequest<'_>, &mut Response) -> Result<(), WsError> + Send + Sync + 'static,
    {
        self.handler = Some(handler.into_boxed_handler());
        self
    }

    pub fn create_param(&mut self, key: impl Into<String>) -> &mut NewParam {
        self.params.push(NewParam { spec: ParamSpec { key: key.into(), ..ParamSpec::default() } });
        let last = self.params.len() - 1;
        &mut self.params[last]
    }

    fn build(self, path: &str) -> Result<ActionSpec, DefinitionError> {
        let key = self.key;
        if key.is_empty() || key.contains(['/', '.']) {
            return Err(DefinitionError::InvalidActionKey { path: path.to_owned(), key });
        }
        let Some(handler) = self.handler else {
            return Err(DefinitionError::MissingHandler { path: path.to_owned(), key });
        };

        let action = format!("{path}/{key}");
        let mut params = IndexMap::with_capacity(self.params.len());
        for NewParam { spec } in self.params {
            check_param(&action, &spec)?;
            if params.contains_key(&spec.key) {
                return Err(DefinitionError::DuplicateParam { action, param: spec.key });
            }
            params.insert(spec.key.clone(), spec);
        }

        Ok(ActionSpec {
            key,
            controller_path: path.to_owned(),
            description: self.description,
            since: self.since,
            post: self.post,
            params,
            handler,
        })
    }
}

fn check_param(action: &str, spec: &ParamSpec) -> Result<(), DefinitionError> {
    if spec.required && spec.default_value.is_some() {
        return Err(DefinitionError::RequiredWithDefault {
            action: action.to_owned(),
            param: spec.key.clone(),
        });
    }
    if let (Some(value), Some(allowed)) = (&spec.default_value, &spec.possible_values) {
        if !allowed.contains(value) {
            return Err(DefinitionError::DefaultNotAllowed {
                action: action.to_owned(),
                param: spec.key.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

/// Parameter under construction.
pub struct NewParam {
    spec: ParamSpec,
}

impl NewParam {
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.spec.description = Some(description.into());
        self
    }

    pub fn set_required(&mut self, required: bool) -> &mut Self {
        self.spec.required = required;
        self
    }

    pub fn set_default_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.spec.default_value = Some(value.into());
        self
    }

    /// Restricts accepted values. Error messages list them in this order.
    pub fn set_possible_values<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.spec.possible_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(_req: &ActionRequest<'_>, _res: &mut Response) -> Result<(), WsError> {
        Ok(())
    }

    fn define(f: impl FnOnce(&mut Context) -> Result<(), DefinitionError>) -> Result<Vec<ControllerSpec>, DefinitionError> {
        let mut context = Context::new();
        f(&mut context)?;
        context.finish()
    }

    #[test]
    fn done_seals_actions_and_params_in_order() {
        let controllers = define(|ctx| {
            let mut controller = ctx.create_controller("api/system");
            controller.set_description("System").set_since("5.3");
            let print = controller.create_action("print");
            print.create_param("message").set_required(true);
            print.create_param("author").set_default_value("-");
            print.set_handler(ok);
            controller.create_action("ping").set_post(true).set_handler(ok);
            controller.done()
        })
        .unwrap();

        let system = &controllers[0];
        assert_eq!(system.path(), "api/system");
        assert_eq!(system.since(), Some("5.3"));
        let keys: Vec<_> = system.actions().map(ActionSpec::key).collect();
        assert_eq!(keys, ["print", "ping"]);
        let params: Vec<_> = system.action("print").unwrap().params().map(ParamSpec::key).collect();
        assert_eq!(params, ["message", "author"]);
        assert!(system.action("ping").unwrap().is_post());
    }

    #[test]
    fn forgetting_done_fails() {
        let err = define(|ctx| {
            ctx.create_controller("api/forgotten").create_action("x").set_handler(ok);
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err, DefinitionError::NotSealed { path: "api/forgotten".to_owned() });
    }

    #[test]
    fn leading_slash_is_rejected() {
        let err = define(|ctx| {
            let mut controller = ctx.create_controller("/api/system");
            controller.create_action("x").set_handler(ok);
            controller.done()
        })
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidPath { .. }));
    }

    #[test]
    fn action_without_handler_is_rejected() {
        let err = define(|ctx| {
            let mut controller = ctx.create_controller("api/system");
            controller.create_action("health");
            controller.done()
        })
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::MissingHandler { path: "api/system".to_owned(), key: "health".to_owned() }
        );
    }

    #[test]
    fn required_param_cannot_have_default() {
        let err = define(|ctx| {
            let mut controller = ctx.create_controller("api/system");
            let action = controller.create_action("print");
            action.create_param("message").set_required(true).set_default_value("hi");
            action.set_handler(ok);
            controller.done()
        })
        .unwrap_err();
        assert!(matches!(err, DefinitionError::RequiredWithDefault { .. }));
    }

    #[test]
    fn default_must_be_a_possible_value() {
        let err = define(|ctx| {
            let mut controller = ctx.create_controller("api/system");
            let action = controller.create_action("print");
            action.create_param("format").set_possible_values(["json", "xml"]).set_default_value("html");
            action.set_handler(ok);
            controller.done()
        })
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DefaultNotAllowed { .. }));
    }

    #[test]
    fn duplicate_controller_and_action_are_rejected() {
        let err = define(|ctx| {
            let mut controller = ctx.create_controller("api/system");
            controller.create_action("a").set_handler(ok);
            controller.create_action("a").set_handler(ok);
            controller.done()
        })
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateAction { .. }));

        let err = define(|ctx| {
            for _ in 0..2 {
                let mut controller = ctx.create_controller("api/system");
                controller.create_action("a").set_handler(ok);
                controller.done()?;
            }
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateController { path: "api/system".to_owned() });
    }
}
