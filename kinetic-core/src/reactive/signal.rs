//! Signal Implementation
//!
//! A signal is a single typed reactive cell. It is the typed counterpart of
//! a [`ReactiveObject`](super::ReactiveObject) slot: reads inside an effect
//! subscribe the effect, writes that change the value notify subscribers.
//!
//! # How Signals Work
//!
//! 1. A signal owns one [`Dep`]. It is not registered in the runtime's
//!    target map, so it goes away with its last handle.
//!
//! 2. [`Signal::get`] tracks that dep; [`Signal::set`] triggers it.
//!
//! 3. Writes are compared with [`WatchValue::same_value`]. Writing an equal
//!    value (including `NaN` over `NaN`) notifies nobody.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::dep::Dep;
use super::runtime::Runtime;
use super::value::WatchValue;

struct SignalInner<T> {
    runtime: Runtime,
    value: RefCell<T>,
    dep: Dep,
}

/// A typed reactive cell.
///
/// # Example
///
/// ```rust
/// use kinetic_core::reactive::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.signal(0_i32);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: WatchValue> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                runtime: runtime.clone(),
                value: RefCell::new(value),
                dep: Dep::new(),
            }),
        }
    }

    /// Get the current value.
    ///
    /// If called within an effect, this also subscribes the effect.
    pub fn get(&self) -> T {
        self.inner.runtime.track_dep(&self.inner.dep);
        self.get_untracked()
    }

    /// Get the current value without subscribing the current effect.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value. Subscribers are notified only if it differs from the
    /// current one.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if current.same_value(&value) {
                return;
            }
            *current = value;
        }
        self.inner.runtime.trigger_dep(&self.inner.dep);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }

    /// Whether two handles point at the same signal.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.inner.value.borrow())
            .field("subscriber_count", &self.inner.dep.len())
            .finish()
    }
}

impl Runtime {
    /// Create a typed signal bound to this runtime.
    pub fn signal<T: WatchValue>(&self, value: T) -> Signal<T> {
        Signal::new(self, value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
