//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive slot is read, the
//! current effect is recorded as a subscriber of that slot.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context holding a stack of
//! frames. Running an effect pushes a frame and the returned guard pops it,
//! so nested activations restore the outer observer even if the inner body
//! panics. A frame may also be empty, which pauses tracking for the code
//! running inside it (see [`Runtime::untracked`](super::Runtime::untracked)).

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{EffectId, Subscriber};

/// The observer stack of one runtime.
#[derive(Default)]
pub(crate) struct ReactiveContext {
    frames: RefCell<Vec<Option<Rc<dyn Subscriber>>>>,
}

impl ReactiveContext {
    /// Enter a new frame. `None` pauses tracking until the guard drops.
    pub(crate) fn enter(&self, observer: Option<Rc<dyn Subscriber>>) -> ContextGuard<'_> {
        let id = observer.as_ref().map(|o| o.id());
        self.frames.borrow_mut().push(observer);
        ContextGuard { context: self, id }
    }

    /// The effect reads should currently be attributed to, if any.
    pub(crate) fn current(&self) -> Option<Rc<dyn Subscriber>> {
        self.frames.borrow().last().cloned().flatten()
    }

    /// Whether the given effect is executing somewhere on the stack.
    pub(crate) fn is_running(&self, id: EffectId) -> bool {
        self.frames
            .borrow()
            .iter()
            .flatten()
            .any(|frame| frame.id() == id)
    }

    /// Number of frames on the stack.
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

/// Guard that pops its frame when dropped.
pub(crate) struct ContextGuard<'a> {
    context: &'a ReactiveContext,
    id: Option<EffectId>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        // The popped frame may hold the last strong reference to an effect,
        // so it must be released after the borrow ends.
        let popped = self.context.frames.borrow_mut().pop();

        if let Some(frame) = &popped {
            debug_assert_eq!(
                frame.as_ref().map(|f| f.id()),
                self.id,
                "ReactiveContext mismatch: expected {:?}",
                self.id
            );
        }
        drop(popped);
    }
}
