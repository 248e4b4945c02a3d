//! Parameter validation and the handler-facing request view.
//!
//! [`validate`] checks a request against the resolved action before the
//! handler runs. Handlers then read parameters through [`ActionRequest`],
//! which applies declared defaults and refuses keys the action never
//! declared.

use crate::definition::{ActionSpec, ParamSpec};
use crate::error::WsError;
use crate::method::Method;
use crate::request::{CallContext, Request};

/// Checks `request` against the parameters `action` declares.
///
/// Fails on the first problem found:
/// 1. a supplied parameter the action does not declare (a contract bug),
/// 2. a required parameter that is missing,
/// 3. a value outside the declared possible values.
pub fn validate(action: &ActionSpec, request: &Request) -> Result<(), WsError> {
    let mut supplied: Vec<&str> = request.param_names().collect();
    supplied.sort_unstable();
    if let Some(name) = supplied.into_iter().find(|name| action.param(name).is_none()) {
        return Err(undeclared(action, name));
    }

    for spec in action.params() {
        match request.param(spec.key()) {
            None if spec.is_required() => return Err(missing(spec.key())),
            None => {}
            Some(value) => check_possible_value(spec, value)?,
        }
    }
    Ok(())
}

fn check_possible_value(spec: &ParamSpec, value: &str) -> Result<(), WsError> {
    let Some(allowed) = spec.possible_values() else {
        return Ok(());
    };
    if allowed.contains(value) {
        return Ok(());
    }
    let list = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    Err(WsError::bad_request(format!(
        "Value of parameter '{}' ({value}) must be one of: [{list}]",
        spec.key()
    )))
}

fn undeclared(action: &ActionSpec, name: &str) -> WsError {
    WsError::bug(format!(
        "BUG - parameter '{name}' is undefined for action '{}'",
        action.key()
    ))
}

fn missing(key: &str) -> WsError {
    WsError::bad_request(format!("The '{key}' parameter is missing"))
}

/// Read-only view of a validated request, handed to handlers.
pub struct ActionRequest<'a> {
    action: &'a ActionSpec,
    request: &'a Request,
    context: &'a CallContext,
}

impl<'a> ActionRequest<'a> {
    pub(crate) fn new(action: &'a ActionSpec, request: &'a Request, context: &'a CallContext) -> Self {
        Self { action, request, context }
    }

    pub fn action(&self) -> &'a ActionSpec { self.action }
    pub fn context(&self) -> &'a CallContext { self.context }
    pub fn method(&self) -> Method { self.request.method() }
    pub fn path(&self) -> &'a str { self.request.path() }
    pub fn body(&self) -> &'a [u8] { self.request.body() }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.request.header(name)
    }

    /// Supplied value, else the declared default, else `None`.
    ///
    /// Asking for a parameter the action does not declare is a bug in the
    /// action, reported as such.
    pub fn param(&self, key: &str) -> Result<Option<&'a str>, WsError> {
        let Some(spec) = self.action.param(key) else {
            return Err(undeclared(self.action, key));
        };
        Ok(self.request.param(key).or(spec.default_value()))
    }

    /// Like [`param`](Self::param), with a call-site fallback. A declared
    /// default still wins over `fallback`.
    pub fn param_or<'s>(&'s self, key: &str, fallback: &'s str) -> Result<&'s str, WsError> {
        Ok(self.param(key)?.unwrap_or(fallback))
    }

    pub fn mandatory_param(&self, key: &str) -> Result<&'a str, WsError> {
        self.param(key)?.ok_or_else(|| missing(key))
    }

    pub fn mandatory_param_as_int(&self, key: &str) -> Result<i64, WsError> {
        let value = self.mandatory_param(key)?;
        value.trim().parse().map_err(|_| {
            WsError::bad_request(format!("'{value}' is not a valid integer for parameter '{key}'"))
        })
    }

    /// Accepts `true`/`false`/`yes`/`no`.
    pub fn param_as_bool(&self, key: &str) -> Result<Option<bool>, WsError> {
        match self.param(key)? {
            None => Ok(None),
            Some("true" | "yes") => Ok(Some(true)),
            Some("false" | "no") => Ok(Some(false)),
            Some(_) => Err(WsError::bad_request(format!(
                "Value of parameter '{key}' must be one of: [true, false, yes, no]"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Context, DefinitionError, WebService};
    use crate::registry::Registry;
    use crate::response::Response;

    fn ok(_req: &ActionRequest<'_>, _res: &mut Response) -> Result<(), WsError> {
        Ok(())
    }

    fn registry() -> Registry {
        let system = |ctx: &mut Context| -> Result<(), DefinitionError> {
            let mut controller = ctx.create_controller("api/system");
            let print = controller.create_action("print");
            print.create_param("message").set_required(true);
            print.create_param("author").set_default_value("-");
            print.create_param("format").set_possible_values(["json", "xml"]);
            print.create_param("count");
            print.create_param("verbose");
            print.set_handler(ok);
            controller.done()
        };
        Registry::build([&system as &dyn WebService]).unwrap()
    }

    fn print_request() -> Request {
        Request::new(Method::Get, "/api/system/print")
    }

    fn bad_request_text(err: WsError) -> String {
        match err {
            WsError::BadRequest(errors) => errors.to_string(),
            other => panic!("expected a bad request, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_parameter() {
        let registry = registry();
        let action = registry.action("api/system", "print").unwrap();
        let err = validate(action, &print_request()).unwrap_err();
        assert_eq!(bad_request_text(err), "The 'message' parameter is missing");
    }

    #[test]
    fn value_outside_possible_values() {
        let registry = registry();
        let action = registry.action("api/system", "print").unwrap();
        let request = print_request().with_param("message", "hi").with_param("format", "html");
        let err = validate(action, &request).unwrap_err();
        assert_eq!(
            bad_request_text(err),
            "Value of parameter 'format' (html) must be one of: [json, xml]"
        );
    }

    #[test]
    fn undeclared_parameter_is_a_bug() {
        let registry = registry();
        let action = registry.action("api/system", "print").unwrap();
        let request = print_request().with_param("message", "hi").with_param("unknown", "x");
        match validate(action, &request).unwrap_err() {
            WsError::Bug(message) => {
                assert_eq!(message, "BUG - parameter 'unknown' is undefined for action 'print'");
            }
            other => panic!("expected a bug, got {other:?}"),
        }
    }

    #[test]
    fn defaults_apply_when_reading() {
        let registry = registry();
        let action = registry.action("api/system", "print").unwrap();
        let request = print_request().with_param("message", "Hello World");
        let context = CallContext::new();
        validate(action, &request).unwrap();

        let view = ActionRequest::new(action, &request, &context);
        assert_eq!(view.mandatory_param("message").unwrap(), "Hello World");
        assert_eq!(view.param("author").unwrap(), Some("-"));
        assert_eq!(view.param_or("author", "nobody").unwrap(), "-");
        assert_eq!(view.param("format").unwrap(), None);
        assert_eq!(view.param_or("format", "json").unwrap(), "json");
        assert!(matches!(view.param("unknown"), Err(WsError::Bug(_))));
    }

    #[test]
    fn typed_readers() {
        let registry = registry();
        let action = registry.action("api/system", "print").unwrap();
        let context = CallContext::new();

        let request = print_request().with_param("count", "3").with_param("verbose", "yes");
        let view = ActionRequest::new(action, &request, &context);
        assert_eq!(view.mandatory_param_as_int("count").unwrap(), 3);
        assert_eq!(view.param_as_bool("verbose").unwrap(), Some(true));

        let request = print_request().with_param("count", "three").with_param("verbose", "maybe");
        let view = ActionRequest::new(action, &request, &context);
        assert_eq!(
            bad_request_text(view.mandatory_param_as_int("count").unwrap_err()),
            "'three' is not a valid integer for parameter 'count'"
        );
        assert_eq!(
            bad_request_text(view.param_as_bool("verbose").unwrap_err()),
            "Value of parameter 'verbose' must be one of: [true, false, yes, no]"
        );
    }
}
