//! Frame Registry
//!
//! Weak table of every live wrapper on this thread and the frame it runs in. Entries are
//! inserted when a wrapper is produced and removed when its last clone is dropped.

use crate::frame::Frame;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static WRAPPER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static REGISTRY: RefCell<FrameRegistry> = RefCell::new(FrameRegistry::new());
}

/// Identity of a produced wrapper. Holding an id does not keep the wrapper alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperId(u64);

impl fmt::Display for WrapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrapper#{}", self.0)
    }
}

/// Wrapper id -> frame, holding neither alive
#[derive(Default)]
pub struct FrameRegistry {
    live: HashMap<WrapperId, Weak<Frame>>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        FrameRegistry {
            live: HashMap::new(),
        }
    }

    /// Allocate a fresh wrapper id for `frame`
    pub fn register(&mut self, frame: &Rc<Frame>) -> WrapperId {
        let id = WrapperId(WRAPPER_ID.fetch_add(1, Ordering::Relaxed));
        self.live.insert(id, Rc::downgrade(frame));
        id
    }

    /// Remove an entry; returns whether it was present
    pub fn release(&mut self, id: WrapperId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// The frame a live wrapper runs in
    pub fn lookup(&self, id: WrapperId) -> Option<Rc<Frame>> {
        self.live.get(&id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: WrapperId) -> bool {
        self.lookup(id).is_some()
    }

    /// Number of wrappers registered against `frame`
    pub fn wrappers_for(&self, frame: &Frame) -> usize {
        self.live
            .values()
            .filter(|weak| weak.as_ptr() == frame as *const Frame)
            .count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

pub(crate) fn register(frame: &Rc<Frame>) -> WrapperId {
    let id = REGISTRY.with(|registry| registry.borrow_mut().register(frame));
    trace!(wrapper = %id, frame_id = %frame.id(), "Registered wrapper");
    id
}

pub(crate) fn release(id: WrapperId) {
    let released = REGISTRY
        .try_with(|registry| registry.borrow_mut().release(id))
        .unwrap_or(false);
    if released {
        trace!(wrapper = %id, "Released wrapper");
    }
}

/// The frame a live wrapper on this thread runs in
pub fn frame_of(id: WrapperId) -> Option<Rc<Frame>> {
    REGISTRY.with(|registry| registry.borrow().lookup(id))
}

pub fn is_live(id: WrapperId) -> bool {
    frame_of(id).is_some()
}

/// Number of live wrappers on this thread
pub fn live_count() -> usize {
    REGISTRY.with(|registry| registry.borrow().len())
}

/// Number of live wrappers on this thread sharing `frame`
pub fn wrappers_for(frame: &Frame) -> usize {
    REGISTRY.with(|registry| registry.borrow().wrappers_for(frame))
}

/// Values that may name a wrapper
///
/// Implemented by [`WrapperId`], by every `ContextFn`, and by `dyn Any`, which names a wrapper
/// only when it holds a `WrapperId`. References and `Rc`, `Box` or `Option` around any of these
/// forward to the inner value.
pub trait AsWrapperId {
    fn wrapper_id(&self) -> Option<WrapperId>;
}

impl AsWrapperId for WrapperId {
    fn wrapper_id(&self) -> Option<WrapperId> {
        Some(*self)
    }
}

impl AsWrapperId for dyn Any {
    fn wrapper_id(&self) -> Option<WrapperId> {
        self.downcast_ref::<WrapperId>().copied()
    }
}

impl<T: AsWrapperId + ?Sized> AsWrapperId for &T {
    fn wrapper_id(&self) -> Option<WrapperId> {
        (**self).wrapper_id()
    }
}

impl<T: AsWrapperId + ?Sized> AsWrapperId for Rc<T> {
    fn wrapper_id(&self) -> Option<WrapperId> {
        (**self).wrapper_id()
    }
}

impl<T: AsWrapperId + ?Sized> AsWrapperId for Box<T> {
    fn wrapper_id(&self) -> Option<WrapperId> {
        (**self).wrapper_id()
    }
}

impl<T: AsWrapperId> AsWrapperId for Option<T> {
    fn wrapper_id(&self) -> Option<WrapperId> {
        self.as_ref().and_then(AsWrapperId::wrapper_id)
    }
}

/// Whether `value` is, or names, a wrapper that is live on this thread
///
/// Values of any other type are checked through `&dyn Any` and are never contexts.
pub fn is_context<V: AsWrapperId + ?Sized>(value: &V) -> bool {
    value.wrapper_id().map_or(false, is_live)
}
