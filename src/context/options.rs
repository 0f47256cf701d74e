//! Construction options for a context wrapper.

use crate::context::fault::{ErrorHandler, Fault};
use crate::frame::{DynamicCell, WrapperId};
use std::fmt;
use std::rc::Rc;

/// The callback a context wraps
pub type Body<A, R> = Rc<dyn Fn(A) -> anyhow::Result<R>>;

/// Options accepted by [`create_context`](crate::context::create_context)
///
/// `body` is required. `on_error` and bindings may only be given when a fresh context is
/// created, never together with `reuse`.
pub struct ContextOptions<A, R> {
    pub(crate) name: Option<String>,
    pub(crate) body: Option<Body<A, R>>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) bindings: Option<Vec<String>>,
    pub(crate) reuse: Option<WrapperId>,
}

impl<A, R> ContextOptions<A, R> {
    pub fn new() -> Self {
        ContextOptions {
            name: None,
            body: None,
            on_error: None,
            bindings: None,
            reuse: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(A) -> anyhow::Result<R> + 'static,
    {
        self.body = Some(Rc::new(body));
        self
    }

    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: Fn(Fault) -> anyhow::Result<()> + 'static,
    {
        self.on_error = Some(Rc::new(handler));
        self
    }

    /// Declare a binding by the qualified name of a declared cell
    pub fn binding(mut self, name: impl Into<String>) -> Self {
        self.bindings.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Declare a set of bindings; an empty set still counts as declaring bindings
    pub fn bindings<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare a binding for `cell`
    pub fn bind<T>(self, cell: &DynamicCell<T>) -> Self {
        let name = cell.name().to_string();
        self.binding(name)
    }

    /// Attach to the context of an existing live wrapper instead of creating a new one
    pub fn reuse(mut self, wrapper: WrapperId) -> Self {
        self.reuse = Some(wrapper);
        self
    }
}

impl<A, R> Default for ContextOptions<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> fmt::Debug for ContextOptions<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("name", &self.name)
            .field("has_body", &self.body.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .field("bindings", &self.bindings)
            .field("reuse", &self.reuse)
            .finish()
    }
}
