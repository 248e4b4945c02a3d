//! Request router: path + method to a declared action.
//!
//! Paths look like `/api/system/health` or `/api/system/health.json`. The last
//! segment is the action key, everything before it the controller path. No
//! parameters in the path, no wildcards: two hash lookups and done.

use crate::definition::ActionSpec;
use crate::error::WsError;
use crate::method::Method;
use crate::registry::Registry;

/// The one representation the engine speaks.
pub const SUPPORTED_EXTENSION: &str = "json";

/// A request path split into its parts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionPath<'p> {
    pub controller: &'p str,
    pub action: &'p str,
    pub extension: Option<&'p str>,
}

impl<'p> ActionPath<'p> {
    /// Splits `path`. A missing leading `/` is tolerated.
    ///
    /// ```rust
    /// use wsengine::ActionPath;
    ///
    /// let parsed = ActionPath::parse("/api/system/health.bat");
    /// assert_eq!(parsed.controller, "api/system");
    /// assert_eq!(parsed.action, "health");
    /// assert_eq!(parsed.extension, Some("bat"));
    /// ```
    pub fn parse(path: &'p str) -> Self {
        let path = path.strip_prefix('/').unwrap_or(path);
        let (controller, last) = match path.rfind('/') {
            Some(slash) => (&path[..slash], &path[slash + 1..]),
            None => ("", path),
        };
        let (action, extension) = match last.rfind('.') {
            Some(dot) => (&last[..dot], Some(&last[dot + 1..])),
            None => (last, None),
        };
        Self { controller, action, extension }
    }
}

/// Resolves requests against a started registry.
pub struct Router<'r> {
    registry: &'r Registry,
}

impl<'r> Router<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Finds the action for `method` + `path`, or the bad request explaining
    /// why there is none.
    pub fn resolve(&self, method: Method, path: &str) -> Result<&'r ActionSpec, WsError> {
        let ActionPath { controller, action, extension } = ActionPath::parse(path);

        if let Some(ext) = extension {
            if ext != SUPPORTED_EXTENSION {
                return Err(WsError::bad_request(format!("Unknown action extension: {ext}")));
            }
        }

        let Some(spec) = self.registry.controller(controller) else {
            return Err(WsError::bad_request(format!("Unknown web service: {controller}")));
        };
        let Some(target) = spec.action(action) else {
            return Err(WsError::bad_request(format!("Unknown action: {controller}/{action}")));
        };

        if target.is_post() && method != Method::Post {
            return Err(WsError::bad_request("HTTP method POST is required"));
        }
        Ok(target)
    }
}
