//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Every [`ActionSpec`](crate::ActionSpec) holds a handler of its own concrete
//! closure type, yet the registry stores them all in one map. So handlers are
//! hidden behind a trait object (`dyn ErasedHandler`) and stored uniformly.
//!
//! ```text
//! |req, res| { res.write_body(b"pong") }     ← user writes this
//!        ↓ action.set_handler(f)
//! f.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(f))                     ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req, res)  at request time    ← one vtable dispatch
//! ```
//!
//! Handlers run synchronously on the caller's thread. They may block; the
//! engine does not care.

use std::sync::Arc;

use crate::error::WsError;
use crate::response::Response;
use crate::validator::ActionRequest;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError>;
}

/// A type-erased handler shared by every call to its action.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid action handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature:
///
/// ```text
/// fn name(req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F
where
    F: Fn(&ActionRequest<'_>, &mut Response) -> Result<(), WsError> + Send + Sync + 'static,
{
}

impl<F> Handler for F
where
    F: Fn(&ActionRequest<'_>, &mut Response) -> Result<(), WsError> + Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F> ErasedHandler for FnHandler<F>
where
    F: Fn(&ActionRequest<'_>, &mut Response) -> Result<(), WsError>,
{
    fn call(&self, req: &ActionRequest<'_>, res: &mut Response) -> Result<(), WsError> {
        (self.0)(req, res)
    }
}
