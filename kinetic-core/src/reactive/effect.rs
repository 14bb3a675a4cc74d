//! Effect Implementation
//!
//! A reactive effect is a re-runnable computation that re-executes whenever
//! something it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately (unless lazy) to
//!    establish its dependencies.
//!
//! 2. When any dependency changes, the effect is notified. Its [`Scheduler`]
//!    decides what happens next: re-run synchronously, or hand the
//!    notification to a caller-supplied function.
//!
//! 3. Before re-running, the effect detaches from every dep it joined last
//!    time and tracks the new set during execution. Conditional reads
//!    therefore never leave stale subscriptions behind.
//!
//! # Ownership
//!
//! Deps only hold weak references to effects. An effect lives as long as a
//! handle to it does; dropping the last [`ReactiveEffect`] ends its
//! subscriptions just like [`ReactiveEffect::stop`] does.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::dep::Dep;
use super::runtime::Runtime;
use super::subscriber::{EffectId, EffectKind, Runner, Subscriber};
use crate::error::{ReactiveError, Result};

/// What a notified effect does.
#[derive(Clone, Default)]
pub enum Scheduler {
    /// Re-run the body synchronously.
    #[default]
    Sync,
    /// Call this function instead. It receives a [`Runner`] and decides when
    /// (or whether) to re-run the effect.
    Custom(Rc<dyn Fn(&Runner)>),
}

impl Scheduler {
    /// Build a custom scheduler from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Runner) + 'static,
    {
        Scheduler::Custom(Rc::new(f))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheduler::Sync => f.write_str("Sync"),
            Scheduler::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options accepted by [`Runtime::effect`].
#[derive(Default)]
pub struct EffectOptions {
    /// Skip the initial run.
    pub lazy: bool,
    /// How the effect reacts to notifications.
    pub scheduler: Scheduler,
    /// Called once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn scheduler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Runner) + 'static,
    {
        self.scheduler = Scheduler::custom(f);
        self
    }

    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.on_stop = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler)
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

pub(crate) struct EffectInner<T> {
    id: EffectId,
    kind: EffectKind,
    runtime: Runtime,
    body: Box<dyn Fn() -> T>,
    scheduler: Scheduler,
    active: Cell<bool>,
    /// Deps this effect is currently subscribed to.
    deps: RefCell<Vec<Dep>>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    run_count: Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    fn execute(self: &Rc<Self>) -> T {
        self.cleanup();

        let observer: Rc<dyn Subscriber> = self.clone();
        let _guard = self.runtime.context().enter(Some(observer));

        let value = (self.body)();
        self.run_count.set(self.run_count.get() + 1);
        value
    }

    /// Detach from every dep this effect joined.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn kind(&self) -> EffectKind {
        self.kind
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn record_dep(&self, dep: &Dep) {
        self.deps.borrow_mut().push(dep.clone());
    }

    fn notify(self: Rc<Self>) {
        if !self.active.get() {
            return;
        }
        match &self.scheduler {
            Scheduler::Sync => {
                self.execute();
            }
            Scheduler::Custom(schedule) => {
                let schedule = Rc::clone(schedule);
                schedule(&Runner::new(self));
            }
        }
    }

    fn rerun(self: Rc<Self>) {
        if self.active.get() {
            self.execute();
        }
    }
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust
/// use kinetic_core::reactive::{EffectOptions, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.reactive();
/// state.set("count", 1_i32);
///
/// let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
/// let effect = runtime.effect(
///     {
///         let state = state.clone();
///         let log = log.clone();
///         move || log.borrow_mut().push(state.get("count").as_f64())
///     },
///     EffectOptions::default(),
/// );
///
/// state.set("count", 2_i32);
/// assert_eq!(*log.borrow(), vec![Some(1.0), Some(2.0)]);
/// effect.stop();
/// ```
pub struct ReactiveEffect<T> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect without running it.
    pub(crate) fn new<F>(
        runtime: &Runtime,
        body: F,
        kind: EffectKind,
        scheduler: Scheduler,
        on_stop: Option<Box<dyn FnOnce()>>,
    ) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                kind,
                runtime: runtime.clone(),
                body: Box::new(body),
                scheduler,
                active: Cell::new(true),
                deps: RefCell::new(Vec::new()),
                on_stop: RefCell::new(on_stop),
                run_count: Cell::new(0),
            }),
        }
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    pub fn kind(&self) -> EffectKind {
        self.inner.kind
    }

    /// Run the body as the current observer and return its result.
    ///
    /// Running a stopped effect is an error.
    pub fn run(&self) -> Result<T> {
        if !self.inner.active.get() {
            return Err(ReactiveError::EffectStopped(self.inner.id));
        }
        Ok(self.inner.execute())
    }

    /// Run the body without tracking anything.
    pub(crate) fn run_untracked(&self) -> T {
        self.inner.runtime.untracked(|| (self.inner.body)())
    }

    /// Stop the effect.
    ///
    /// It will not be notified again and is removed from every dep that
    /// references it. Stopping twice is a no-op.
    pub fn stop(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        self.inner.cleanup();
        debug!(effect = %self.inner.id, "effect stopped");

        let on_stop = self.inner.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of deps the effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// A runner for this effect, as handed to custom schedulers.
    pub fn runner(&self) -> Runner {
        Runner::new(self.inner.clone())
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("run_count", &self.inner.run_count.get())
            .field("dependency_count", &self.inner.deps.borrow().len())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

impl Runtime {
    /// Create a plain effect.
    ///
    /// The effect runs immediately unless `options.lazy` is set. Keep the
    /// returned handle alive for as long as the effect should react.
    #[must_use = "the effect stops reacting once every handle is dropped"]
    pub fn effect<T, F>(&self, body: F, options: EffectOptions) -> ReactiveEffect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        let effect = ReactiveEffect::new(
            self,
            body,
            EffectKind::Plain,
            options.scheduler,
            options.on_stop,
        );
        if !options.lazy {
            effect.inner.execute();
        }
        effect
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Key;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));

        let effect = runtime.effect(
            {
                let runs = runs.clone();
                move || runs.set(runs.get() + 1)
            },
            EffectOptions::default(),
        );

        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_waits_for_run() {
        let runtime = Runtime::new();
        let effect = runtime.effect(|| 7, EffectOptions::new().lazy(true));

        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.run(), Ok(7));
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_on_trigger() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _effect = runtime.effect(
            {
                let state = state.clone();
                let seen = seen.clone();
                move || seen.borrow_mut().push(state.get("a").as_f64())
            },
            EffectOptions::default(),
        );

        state.set("a", 2_i32);
        state.set("a", 3_i32);
        assert_eq!(*seen.borrow(), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn custom_scheduler_replaces_rerun() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        let scheduled = Rc::new(RefCell::new(Vec::new()));

        let effect = runtime.effect(
            {
                let state = state.clone();
                move || state.get("a")
            },
            EffectOptions::new().scheduler({
                let scheduled = scheduled.clone();
                move |runner: &Runner| scheduled.borrow_mut().push(runner.clone())
            }),
        );

        state.set("a", 1_i32);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(scheduled.borrow().len(), 1);

        let runner = scheduled.borrow_mut().pop().unwrap();
        assert_eq!(runner.id(), effect.id());
        runner.run();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn stop_detaches_and_silences() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        let stopped = Rc::new(Cell::new(0));

        let effect = runtime.effect(
            {
                let state = state.clone();
                move || {
                    state.get("a");
                    state.get("b");
                }
            },
            EffectOptions::new().on_stop({
                let stopped = stopped.clone();
                move || stopped.set(stopped.get() + 1)
            }),
        );
        assert_eq!(effect.dependency_count(), 2);

        effect.stop();
        effect.stop();

        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(stopped.get(), 1);
        let dep = runtime.dep(state.id(), &Key::from("a")).unwrap();
        assert!(dep.is_empty());

        state.set("a", 5_i32);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.run(), Err(ReactiveError::EffectStopped(effect.id())));
    }

    #[test]
    fn conditional_dependencies_are_cleaned_up() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("flag", true);
        state.set("a", 1_i32);
        state.set("b", 2_i32);

        let effect = runtime.effect(
            {
                let state = state.clone();
                move || {
                    if state.get("flag").as_bool() == Some(true) {
                        state.get("a");
                    } else {
                        state.get("b");
                    }
                }
            },
            EffectOptions::default(),
        );
        assert_eq!(effect.run_count(), 1);

        state.set("flag", false);
        assert_eq!(effect.run_count(), 2);

        // "a" is no longer read.
        state.set("a", 10_i32);
        assert_eq!(effect.run_count(), 2);

        state.set("b", 20_i32);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn dropping_last_handle_ends_subscriptions() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        let runs = Rc::new(Cell::new(0));

        let effect = runtime.effect(
            {
                let state = state.clone();
                let runs = runs.clone();
                move || {
                    state.get("a");
                    runs.set(runs.get() + 1);
                }
            },
            EffectOptions::default(),
        );
        drop(effect);

        state.set("a", 1_i32);
        assert_eq!(runs.get(), 1);
        assert!(runtime.dep(state.id(), &Key::from("a")).unwrap().is_empty());
    }

    #[test]
    fn self_triggering_effect_does_not_recurse() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("n", 0_i32);

        let effect = runtime.effect(
            {
                let state = state.clone();
                move || {
                    let n = state.get("n").as_f64().unwrap_or_default();
                    state.set("n", n + 1.0);
                }
            },
            EffectOptions::default(),
        );

        assert_eq!(effect.run_count(), 1);
        assert_eq!(state.get_untracked("n"), crate::reactive::Value::Number(1.0));
    }

    #[test]
    fn nested_effects_restore_outer_observer() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        let inner_slot: Rc<RefCell<Option<ReactiveEffect<()>>>> = Rc::default();

        let outer = runtime.effect(
            {
                let runtime = runtime.clone();
                let state = state.clone();
                let inner_slot = inner_slot.clone();
                move || {
                    let inner = runtime.effect(
                        {
                            let state = state.clone();
                            move || {
                                state.get("inner");
                            }
                        },
                        EffectOptions::default(),
                    );
                    *inner_slot.borrow_mut() = Some(inner);
                    // Read after the inner effect finished.
                    state.get("outer");
                }
            },
            EffectOptions::default(),
        );

        let outer_dep = runtime.dep(state.id(), &Key::from("outer")).unwrap();
        assert!(outer_dep.contains(outer.id()));
        let inner_dep = runtime.dep(state.id(), &Key::from("inner")).unwrap();
        assert!(!inner_dep.contains(outer.id()));
        assert_eq!(runtime.current_effect(), None);
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = runtime.effect(|| {}, EffectOptions::default());
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.run().unwrap();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }

    #[test]
    fn effect_stopped_in_its_own_body_stays_detached() {
        let runtime = Runtime::new();
        let state = runtime.reactive();
        state.set("a", 1_i32);
        let slot: Rc<RefCell<Option<ReactiveEffect<()>>>> = Rc::new(RefCell::new(None));

        let effect = runtime.effect(
            {
                let state = state.clone();
                let slot = slot.clone();
                move || {
                    if let Some(me) = slot.borrow().as_ref() {
                        me.stop();
                    }
                    state.get("a");
                }
            },
            EffectOptions::default(),
        );
        *slot.borrow_mut() = Some(effect.clone());

        // The re-run stops the effect, then reads "a" again.
        state.set("a", 2_i32);
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);
        assert!(runtime.dep(state.id(), &Key::from("a")).unwrap().is_empty());

        state.set("a", 3_i32);
        assert_eq!(effect.run_count(), 2);

        slot.borrow_mut().take();
    }
}
