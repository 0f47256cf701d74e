//! Handler chain walk
//!
//! A failure that escapes a wrapped body is offered to every handler from the failing context
//! outward. The trace is built once, at the deepest point, and shared by every handler.

use crate::frame::current::CurrentGuard;
use crate::frame::{Frame, Trace};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Error handler attached to a context. `Ok(())` absorbs the failure; `Err(e)` passes `e`
/// outward to the next handler.
pub type ErrorHandler = Rc<dyn Fn(Fault) -> anyhow::Result<()>>;

/// Where the failure a handler is looking at came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultOrigin {
    /// Raised by the wrapped body
    Body,
    /// Raised by the handler of the named context while it processed an earlier failure
    Handler { context: String },
}

/// A failure in flight, as handed to an error handler
pub struct Fault {
    trace: Rc<Trace>,
    error: anyhow::Error,
    origin: FaultOrigin,
    context: String,
}

impl Fault {
    /// Trace built from the original failure point
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn origin(&self) -> &FaultOrigin {
        &self.origin
    }

    /// Name of the context whose handler is receiving this fault
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }

    /// Decline to handle the failure and pass it on unchanged
    pub fn rethrow(self) -> anyhow::Result<()> {
        Err(self.error)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("error", &self.error)
            .field("origin", &self.origin)
            .field("context", &self.context)
            .finish()
    }
}

/// Offer `error` to the handlers from `frame` outward
///
/// Each handler runs with its context's parent installed as current. Returns `Ok(())` once a
/// handler absorbs the failure, otherwise the last failure raised.
pub(crate) fn walk_handlers(frame: &Frame, error: anyhow::Error) -> anyhow::Result<()> {
    let trace = Rc::new(Trace::capture(frame, &error));
    debug!(
        context = %frame.name(),
        error = %error,
        "Wrapped callback failed, walking handlers"
    );

    let mut error = error;
    let mut origin = FaultOrigin::Body;

    for owner in frame.ancestors() {
        let Some(handler) = owner.handler() else {
            continue;
        };
        let handler = Rc::clone(handler);
        let fault = Fault {
            trace: Rc::clone(&trace),
            error,
            origin,
            context: owner.name().to_string(),
        };

        let outcome = {
            let _scope = CurrentGuard::install(owner.parent().cloned());
            handler(fault)
        };

        match outcome {
            Ok(()) => {
                debug!(context = %owner.name(), "Handler absorbed failure");
                return Ok(());
            }
            Err(next) => {
                trace!(context = %owner.name(), error = %next, "Handler passed failure on");
                error = next;
                origin = FaultOrigin::Handler {
                    context: owner.name().to_string(),
                };
            }
        }
    }

    warn!(context = %frame.name(), error = %error, "No handler absorbed failure");
    Err(error)
}
