//! Context wrappers
//!
//! A wrapper carries the dynamic context that was current when it was created. Invoking it
//! reinstalls that context, swaps in the bindings its ancestry declares, runs the body and, if
//! the body fails, walks the handlers from that context outward.

pub mod fault;
pub mod options;

pub use fault::{ErrorHandler, Fault, FaultOrigin};
pub use options::{Body, ContextOptions};

use crate::error::ConfigError;
use crate::frame::bindings::{BindingScope, BindingStore};
use crate::frame::current::{current_context, CurrentGuard};
use crate::frame::registry::AsWrapperId;
use crate::frame::{registry, Frame, Trace, WrapperId};
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use tracing::{debug, trace};

/// Result of a wrapper invocation that did not end in an unhandled failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The body returned normally
    Completed(R),
    /// The body failed and a handler absorbed the failure
    Handled,
}

impl<R> Outcome<R> {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled)
    }

    pub fn completed(self) -> Option<R> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Handled => None,
        }
    }
}

struct WrapperCore {
    id: WrapperId,
    frame: Rc<Frame>,
}

impl Drop for WrapperCore {
    fn drop(&mut self) {
        registry::release(self.id);
    }
}

/// An invocable wrapper around a body callback
///
/// Clones share one identity; the registry entry goes away when the last clone is dropped.
pub struct ContextFn<A, R> {
    core: Rc<WrapperCore>,
    body: Body<A, R>,
}

impl<A, R> Clone for ContextFn<A, R> {
    fn clone(&self) -> Self {
        ContextFn {
            core: Rc::clone(&self.core),
            body: Rc::clone(&self.body),
        }
    }
}

impl<A, R> fmt::Debug for ContextFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFn")
            .field("id", &self.core.id)
            .field("frame", &self.core.frame.id())
            .field("name", &self.core.frame.name())
            .finish()
    }
}

impl<A, R> ContextFn<A, R> {
    pub fn id(&self) -> WrapperId {
        self.core.id
    }

    /// The context this wrapper runs its body in
    pub fn frame(&self) -> &Rc<Frame> {
        &self.core.frame
    }

    pub fn name(&self) -> &str {
        self.core.frame.name()
    }

    pub fn is_context(&self) -> bool {
        registry::is_live(self.core.id)
    }

    /// Invoke the body inside this wrapper's context
    ///
    /// Returns `Err` only when the body failed and no handler from this context outward
    /// absorbed the failure; the error is the last one raised.
    pub fn call(&self, args: A) -> anyhow::Result<Outcome<R>> {
        let frame = &self.core.frame;
        trace!(wrapper = %self.core.id, context = %frame.name(), "Invoking wrapped callback");

        let result = {
            let _installed = CurrentGuard::install(Some(Rc::clone(frame)));
            let _bindings = BindingScope::enter(frame);
            (self.body)(args)
        };

        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(error) => {
                fault::walk_handlers(frame, error)?;
                Ok(Outcome::Handled)
            }
        }
    }

    /// A plain closure a host can store and call like any other callback
    ///
    /// The closure is opaque: keep the `ContextFn` (or its id) where the callback must later be
    /// recognised by [`is_context`](crate::frame::is_context).
    pub fn into_callback(self) -> impl Fn(A) -> anyhow::Result<Outcome<R>> {
        move |args| self.call(args)
    }
}

impl<A, R> AsWrapperId for ContextFn<A, R> {
    fn wrapper_id(&self) -> Option<WrapperId> {
        Some(self.core.id)
    }
}

/// Build a wrapper from `options`
///
/// A fresh context's parent is the context current right now, not at invocation time.
#[track_caller]
pub fn create_context<A, R>(options: ContextOptions<A, R>) -> Result<ContextFn<A, R>, ConfigError> {
    let origin = Location::caller();
    let ContextOptions {
        name,
        body,
        on_error,
        bindings,
        reuse,
    } = options;

    let body = body.ok_or(ConfigError::MissingBody)?;

    let frame = match reuse {
        Some(existing) => {
            if on_error.is_some() {
                return Err(ConfigError::ReuseWithHandler);
            }
            if bindings.is_some() {
                return Err(ConfigError::ReuseWithBindings);
            }
            let frame = registry::frame_of(existing).ok_or(ConfigError::InvalidReuse(existing))?;
            debug!(reuse = %existing, context = %frame.name(), "Re-entering existing context");
            frame
        }
        None => {
            let store = match bindings {
                Some(names) => Some(BindingStore::capture(&names)?),
                None => None,
            };
            Frame::new(display_name(origin, name.as_deref()), current_context(), on_error, store)
        }
    };

    Ok(finish(frame, body))
}

/// Wrap `body` in a fresh context with no handler and no bindings
#[track_caller]
pub fn wrap<A, R, F>(name: &str, body: F) -> ContextFn<A, R>
where
    F: Fn(A) -> anyhow::Result<R> + 'static,
{
    let origin = Location::caller();
    let frame = Frame::new(display_name(origin, Some(name)), current_context(), None, None);
    finish(frame, Rc::new(body))
}

/// Trace for `failure` from the current context, if any
pub fn current_trace(failure: &dyn fmt::Display) -> Option<Trace> {
    current_context().map(|frame| Trace::capture(&frame, failure))
}

fn finish<A, R>(frame: Rc<Frame>, body: Body<A, R>) -> ContextFn<A, R> {
    let id = registry::register(&frame);
    debug!(wrapper = %id, context = %frame.name(), depth = frame.depth(), "Created context wrapper");
    ContextFn {
        core: Rc::new(WrapperCore { id, frame }),
        body,
    }
}

fn display_name(origin: &Location<'_>, name: Option<&str>) -> String {
    let settings = crate::config::current();
    let name = name.unwrap_or(&settings.default_name);
    if settings.origin_locations {
        format!(
            "{}:{}:{} - {}",
            origin.file(),
            origin.line(),
            origin.column(),
            name
        )
    } else {
        name.to_string()
    }
}
