//! Current-context slot
//!
//! One slot per thread. Installing a frame is a strict save/restore for the duration of a
//! single synchronous call.

use crate::frame::Frame;
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Frame>>> = const { RefCell::new(None) };
}

/// The context installed by the innermost wrapper invocation running on this thread
///
/// `None` outside of any invocation.
pub fn current_context() -> Option<Rc<Frame>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Restores the previously current frame when dropped
pub(crate) struct CurrentGuard {
    previous: Option<Rc<Frame>>,
}

impl CurrentGuard {
    pub(crate) fn install(frame: Option<Rc<Frame>>) -> Self {
        let previous = CURRENT.with(|current| current.replace(frame));
        CurrentGuard { previous }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let replaced = CURRENT.try_with(|current| current.replace(previous));
        drop(replaced);
    }
}
