//! Context Frames
//!
//! One node of the dynamic-scope tree. A frame is built once and never re-parented; only the
//! values in its binding store change, and only while a wrapper rooted at or below it runs.
//! Children hold a strong reference to their parent and parents never see their children, so
//! the structure is a parent-pointer tree.

pub mod bindings;
pub mod current;
pub mod registry;
pub mod trace;

pub use bindings::{with_scoped_value, BindingStore, DynamicCell, ScopedBinding, StoredBinding};
pub use current::current_context;
pub use registry::{is_context, AsWrapperId, FrameRegistry, WrapperId};
pub use trace::{build_trace, Trace};

use crate::context::fault::ErrorHandler;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static FRAME_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LIVE_FRAMES: Cell<usize> = const { Cell::new(0) };
}

/// Process-unique frame identifier, used in diagnostics only
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// One dynamic scope: display name, optional error handler, optional binding storage and the
/// context that was current when it was created.
pub struct Frame {
    id: FrameId,
    name: String,
    parent: Option<Rc<Frame>>,
    handler: Option<ErrorHandler>,
    bindings: Option<BindingStore>,
}

impl Frame {
    pub(crate) fn new(
        name: String,
        parent: Option<Rc<Frame>>,
        handler: Option<ErrorHandler>,
        bindings: Option<BindingStore>,
    ) -> Rc<Self> {
        let frame = Frame {
            id: FrameId(FRAME_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            parent,
            handler,
            bindings,
        };
        LIVE_FRAMES.with(|count| count.set(count.get() + 1));
        trace!(
            frame_id = %frame.id,
            name = %frame.name,
            parent = ?frame.parent.as_ref().map(|p| p.id),
            "Allocated context frame"
        );
        Rc::new(frame)
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Display name, `<origin-location> - <name>` unless origin locations are disabled
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub(crate) fn handler(&self) -> Option<&ErrorHandler> {
        self.handler.as_ref()
    }

    pub fn bindings(&self) -> Option<&BindingStore> {
        self.bindings.as_ref()
    }

    /// Whether this frame itself declares a binding for `name` (ancestors are not consulted)
    pub fn declares(&self, name: &str) -> bool {
        self.bindings
            .as_ref()
            .map_or(false, |store| store.contains(name))
    }

    /// Iterate from this frame outward to the root, this frame first
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Number of enclosing frames
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// The nearest frame, starting from this one, that declares `name`
    pub fn binding_owner(&self, name: &str) -> Option<&Frame> {
        self.ancestors().find(|frame| frame.declares(name))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("has_handler", &self.handler.is_some())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let _ = LIVE_FRAMES.try_with(|count| count.set(count.get().saturating_sub(1)));
        trace!(frame_id = %self.id, name = %self.name, "Released context frame");
    }
}

/// Iterator over a frame and its ancestors, innermost first
pub struct Ancestors<'a> {
    next: Option<&'a Frame>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.next?;
        self.next = frame.parent.as_deref();
        Some(frame)
    }
}

/// Number of frames currently alive on this thread
pub fn live_frames() -> usize {
    LIVE_FRAMES.with(|count| count.get())
}
