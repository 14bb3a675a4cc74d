//! Computed Implementation
//!
//! A computed value is a cached derived value that re-evaluates only when
//! its dependencies change, and only when somebody reads it.
//!
//! # How Computed Values Work
//!
//! 1. On first access, the computed runs its getter (tracking what it reads)
//!    and caches the result.
//!
//! 2. When accessed again with nothing changed, it returns the cached value.
//!
//! 3. When a dependency changes, the computed is marked dirty and its own
//!    subscribers are notified in the same cycle. It does not recompute yet.
//!
//! 4. The next read recomputes and caches again.
//!
//! # Ordering
//!
//! The inner effect is tagged [`EffectKind::Derived`], so a trigger marks
//! every computed dirty before any plain effect runs. A plain effect that
//! reads a computed therefore always sees the post-change value.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::dep::Dep;
use super::effect::{ReactiveEffect, Scheduler};
use super::runtime::Runtime;
use super::subscriber::{EffectId, EffectKind};

/// Dirty state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or the value was never computed).
    Dirty,
}

struct ComputedInner<T> {
    runtime: Runtime,

    /// The getter, wrapped in a derived effect.
    effect: ReactiveEffect<T>,

    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    state: Cell<ComputedState>,

    /// Effects that read this computed.
    dep: Dep,
}

impl<T: 'static> ComputedInner<T> {
    /// Called by the inner effect's scheduler when a dependency changes.
    fn invalidate(&self) {
        if self.state.get() == ComputedState::Dirty {
            return;
        }
        self.state.set(ComputedState::Dirty);
        trace!(effect = %self.effect_id(), "computed invalidated");
        self.runtime.trigger_dep(&self.dep);
    }

    fn effect_id(&self) -> EffectId {
        self.effect.id()
    }
}

/// A cached derived value that recomputes lazily.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Reads hand out clones.
///
/// Cloning a `Computed` yields another handle to the same cache.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Create a computed value. The getter does not run until first read.
    pub fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler = Scheduler::custom(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });

            ComputedInner {
                runtime: runtime.clone(),
                effect: ReactiveEffect::new(runtime, getter, EffectKind::Derived, scheduler, None),
                value: RefCell::new(None),
                state: Cell::new(ComputedState::Dirty),
                dep: Dep::new(),
            }
        });

        Self { inner }
    }

    /// ID of the inner effect.
    pub fn id(&self) -> EffectId {
        self.inner.effect_id()
    }

    /// Get the current value, recomputing if dirty.
    ///
    /// Inside an effect this also subscribes the effect to the computed.
    pub fn get(&self) -> T {
        self.inner.runtime.track_dep(&self.inner.dep);
        self.value()
    }

    /// Get the current value without subscribing the current effect.
    pub fn get_untracked(&self) -> T {
        self.value()
    }

    fn value(&self) -> T {
        if self.inner.state.get() == ComputedState::Clean {
            if let Some(value) = self.inner.value.borrow().as_ref() {
                return value.clone();
            }
        }

        // A stopped computed keeps evaluating on demand, but no longer tracks.
        let value = match self.inner.effect.run() {
            Ok(value) => value,
            Err(_) => self.inner.effect.run_untracked(),
        };
        *self.inner.value.borrow_mut() = Some(value.clone());
        if self.inner.effect.is_active() {
            self.inner.state.set(ComputedState::Clean);
        }
        value
    }

    /// Current dirty state.
    pub fn state(&self) -> ComputedState {
        self.inner.state.get()
    }

    /// Whether a value has been cached.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of getter evaluations so far.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    /// Number of effects that read this computed.
    pub fn dependent_count(&self) -> usize {
        self.inner.dep.len()
    }

    /// Stop tracking dependencies.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.effect.is_active()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.effect_id())
            .field("state", &self.inner.state.get())
            .field("value", &self.inner.value.borrow())
            .field("dependent_count", &self.inner.dep.len())
            .finish()
    }
}

impl Runtime {
    /// Create a computed value owned by this runtime.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, getter)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{EffectOptions, Value};

    fn number(value: Value) -> f64 {
        value.as_f64().unwrap_or(f64::NAN)
    }

    #[test]
    fn computed_is_lazy() {
        let runtime = Runtime::new();
        let computed = runtime.computed(|| 42);

        assert!(!computed.has_value());
        assert_eq!(computed.compute_count(), 0);
        assert_eq!(computed.state(), ComputedState::Dirty);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.compute_count(), 1);
        assert!(computed.has_value());
    }

    #[test]
    fn computed_caches_until_dependency_changes() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);
        state.set("b", 2_i32);

        let sum = {
            let state = state.clone();
            runtime.computed(move || number(state.get("a")) + number(state.get("b")))
        };

        assert_eq!(sum.get(), 3.0);
        assert_eq!(sum.get(), 3.0);
        assert_eq!(sum.compute_count(), 1);

        state.set("a", 10_i32);
        assert_eq!(sum.state(), ComputedState::Dirty);
        // Invalidation alone does not recompute.
        assert_eq!(sum.compute_count(), 1);

        assert_eq!(sum.get(), 12.0);
        assert_eq!(sum.compute_count(), 2);
        assert_eq!(sum.state(), ComputedState::Clean);
    }

    #[test]
    fn computed_depends_on_computed() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("base", 5_i32);

        let doubled = {
            let state = state.clone();
            runtime.computed(move || number(state.get("base")) * 2.0)
        };
        let plus_ten = {
            let doubled = doubled.clone();
            runtime.computed(move || doubled.get() + 10.0)
        };

        assert_eq!(plus_ten.get(), 20.0);
        assert_eq!(doubled.dependent_count(), 1);

        state.set("base", 10_i32);
        assert_eq!(plus_ten.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.get(), 30.0);
    }

    #[test]
    fn effect_reading_computed_sees_fresh_value() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);

        let doubled = {
            let state = state.clone();
            runtime.computed(move || number(state.get("a")) * 2.0)
        };

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _effect = runtime.effect(
            {
                let doubled = doubled.clone();
                let state = state.clone();
                let seen = seen.clone();
                move || {
                    // Reads the source directly too, so one trigger reaches
                    // this effect both ways.
                    let a = number(state.get("a"));
                    seen.borrow_mut().push((a, doubled.get()));
                }
            },
            EffectOptions::default(),
        );

        state.set("a", 4_i32);

        for &(a, doubled) in seen.borrow().iter() {
            assert_eq!(doubled, a * 2.0);
        }
        assert_eq!(seen.borrow().last(), Some(&(4.0, 8.0)));
    }

    #[test]
    fn sibling_computeds_are_both_fresh() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);

        let double = {
            let state = state.clone();
            runtime.computed(move || number(state.get("a")) * 2.0)
        };
        let triple = {
            let state = state.clone();
            runtime.computed(move || number(state.get("a")) * 3.0)
        };

        let seen = Rc::new(RefCell::new(Vec::new()));
        let effect = runtime.effect(
            {
                let seen = seen.clone();
                move || seen.borrow_mut().push((double.get(), triple.get()))
            },
            EffectOptions::default(),
        );

        state.set("a", 10_i32);

        assert_eq!(*seen.borrow(), vec![(2.0, 3.0), (20.0, 30.0)]);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn stopped_computed_no_longer_invalidates() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);

        let computed = {
            let state = state.clone();
            runtime.computed(move || number(state.get("a")))
        };
        assert_eq!(computed.get(), 1.0);

        computed.stop();
        assert!(!computed.is_active());
        state.set("a", 2_i32);
        assert_eq!(computed.state(), ComputedState::Clean);
        assert_eq!(computed.get(), 1.0);
    }

    #[test]
    fn computed_clone_shares_state() {
        let runtime = Runtime::new();
        let computed1 = runtime.computed(|| 42);
        assert_eq!(computed1.get(), 42);

        let computed2 = computed1.clone();
        assert_eq!(computed1.id(), computed2.id());
        assert!(computed2.has_value());
        assert_eq!(computed2.get(), 42);
        assert_eq!(computed2.compute_count(), 1);
    }
}
