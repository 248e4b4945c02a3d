//! Built-in health-check web service.
//!
//! Kubernetes asks two questions. [`HealthWs`] answers them.
//!
//! | Probe | Path | Answer |
//! |---|---|---|
//! | **Liveness** | `/api/health/liveness` | `204 No Content` while the process can dispatch at all |
//! | **Readiness** | `/api/health/readiness` | `200 ready` |
//!
//! Register it next to your own services:
//!
//! ```rust
//! use wsengine::{Engine, health::HealthWs};
//!
//! let mut engine = Engine::builder().service(HealthWs).build();
//! engine.start().unwrap();
//! assert!(engine.controller("api/health").is_some());
//! ```
//!
//! Gate readiness on your own dependencies by defining a controller of your
//! own instead.

use crate::definition::{Context, DefinitionError, WebService};
use crate::error::WsError;
use crate::response::{ContentType, Response};
use crate::validator::ActionRequest;

pub const CONTROLLER_PATH: &str = "api/health";

pub struct HealthWs;

impl WebService for HealthWs {
    fn define(&self, context: &mut Context) -> Result<(), DefinitionError> {
        let mut controller = context.create_controller(CONTROLLER_PATH);
        controller.set_description("Process health probes");
        controller
            .create_action("liveness")
            .set_description("Answers 204 as long as requests are dispatched")
            .set_handler(liveness);
        controller
            .create_action("readiness")
            .set_description("Answers 200 with body `ready`")
            .set_handler(readiness);
        controller.done()
    }
}

/// Liveness probe. No dependencies on purpose.
pub fn liveness(_req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError> {
    res.no_content();
    Ok(())
}

/// Readiness probe (default implementation).
pub fn readiness(_req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError> {
    res.set_content_type(ContentType::Text);
    res.write_body(b"ready")
}
