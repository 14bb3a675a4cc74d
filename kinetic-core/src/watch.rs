//! Watchers
//!
//! A watcher observes a source and calls back with `(new, old)` when the
//! source's value changes. Unlike a plain effect, a watcher never reacts
//! synchronously: its scheduler queues a job on the runtime's pre-flush
//! queue, and the callback runs when the host flushes.
//!
//! # Batching
//!
//! The job has a fixed ID per watcher, so any number of writes before a
//! flush collapse into one callback. That callback receives the latest value
//! and the value seen at the previous callback (or at setup).
//!
//! # Equality
//!
//! A non-deep watcher skips its callback when the new value is the same as
//! the old one under [`WatchValue::same_value`]. Deep watchers always call
//! back, since a nested write leaves the top-level value unchanged.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{ReactiveError, Result};
use crate::reactive::{
    Computed, EffectId, EffectKind, ReactiveEffect, ReactiveObject, Runtime, Scheduler, Signal,
    Value, WatchValue,
};
use crate::scheduler::{Job, JobId};

/// Options accepted by the `watch*` family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback once at setup with `(initial, None)`.
    pub immediate: bool,
    /// Read every slot reachable from the watched value, and call back on any
    /// nested change.
    pub deep: bool,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }
}

type Callback<T> = Box<dyn FnMut(&T, Option<&T>)>;

struct WatchInner<T> {
    effect: ReactiveEffect<T>,
    callback: RefCell<Callback<T>>,
    old_value: RefCell<Option<T>>,
    deep: bool,
}

impl<T: WatchValue> WatchInner<T> {
    fn job(&self) {
        let new_value = match self.effect.run() {
            Ok(value) => value,
            // Stopped after the job was queued.
            Err(_) => return,
        };

        let changed = self.deep
            || self
                .old_value
                .borrow()
                .as_ref()
                .map_or(true, |old| !new_value.same_value(old));
        if !changed {
            trace!(watcher = %self.effect.id(), "watch value unchanged");
            return;
        }

        let old_value = self.old_value.borrow_mut().take();
        debug!(watcher = %self.effect.id(), "watch callback");
        {
            let mut callback = self.callback.borrow_mut();
            callback(&new_value, old_value.as_ref());
        }
        *self.old_value.borrow_mut() = Some(new_value);
    }
}

trait WatchControl {
    fn id(&self) -> EffectId;
    fn stop(&self);
    fn is_active(&self) -> bool;
}

impl<T: WatchValue> WatchControl for WatchInner<T> {
    fn id(&self) -> EffectId {
        self.effect.id()
    }

    fn stop(&self) {
        self.effect.stop();
    }

    fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

/// Stop handle returned by the `watch*` family.
///
/// The watcher lives as long as the handle. Dropping it has the same effect
/// as [`WatchHandle::stop`].
#[must_use = "the watcher stops once its handle is dropped"]
pub struct WatchHandle {
    inner: Rc<dyn WatchControl>,
}

impl WatchHandle {
    /// ID of the watcher's effect.
    pub fn id(&self) -> EffectId {
        self.inner.id()
    }

    /// Stop watching. Jobs already queued become no-ops.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Runtime {
    /// Watch the value returned by `getter`.
    pub fn watch<T, G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        T: WatchValue,
        G: Fn() -> T + 'static,
        C: FnMut(&T, Option<&T>) + 'static,
    {
        let deep = options.deep;
        let getter = move || {
            let value = getter();
            if deep {
                value.traverse(&mut HashSet::new());
            }
            value
        };

        let runtime = self.clone();
        let job_id = JobId::new();
        let inner = Rc::new_cyclic(|weak: &Weak<WatchInner<T>>| {
            let weak = weak.clone();
            let scheduler = Scheduler::custom(move |_| {
                let weak = weak.clone();
                runtime.queue_pre_flush(Job::with_id(job_id, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.job();
                    }
                }));
            });

            WatchInner {
                effect: ReactiveEffect::new(self, getter, EffectKind::Plain, scheduler, None),
                callback: RefCell::new(Box::new(callback)),
                old_value: RefCell::new(None),
                deep,
            }
        });

        if options.immediate {
            inner.job();
        } else if let Ok(initial) = inner.effect.run() {
            *inner.old_value.borrow_mut() = Some(initial);
        }
        debug!(watcher = %inner.effect.id(), job = %job_id, deep, "watch created");

        WatchHandle { inner }
    }

    /// Watch a computed value.
    pub fn watch_computed<T, C>(
        &self,
        computed: &Computed<T>,
        callback: C,
        options: WatchOptions,
    ) -> WatchHandle
    where
        T: WatchValue,
        C: FnMut(&T, Option<&T>) + 'static,
    {
        let computed = computed.clone();
        self.watch(move || computed.get(), callback, options)
    }

    /// Watch a signal.
    pub fn watch_signal<T, C>(
        &self,
        signal: &Signal<T>,
        callback: C,
        options: WatchOptions,
    ) -> WatchHandle
    where
        T: WatchValue,
        C: FnMut(&T, Option<&T>) + 'static,
    {
        let signal = signal.clone();
        self.watch(move || signal.get(), callback, options)
    }

    /// Watch a reactive object. Always deep: any nested write calls back.
    pub fn watch_object<C>(
        &self,
        object: &ReactiveObject,
        callback: C,
        options: WatchOptions,
    ) -> WatchHandle
    where
        C: FnMut(&ReactiveObject, Option<&ReactiveObject>) + 'static,
    {
        let object = object.clone();
        self.watch(move || object.clone(), callback, options.deep(true))
    }

    /// Watch a dynamically typed value. Only objects can be watched.
    pub fn watch_value<C>(
        &self,
        source: &Value,
        callback: C,
        options: WatchOptions,
    ) -> Result<WatchHandle>
    where
        C: FnMut(&Value, Option<&Value>) + 'static,
    {
        let Value::Object(object) = source else {
            return Err(ReactiveError::InvalidWatchSource(source.type_name()));
        };
        let source = Value::Object(object.clone());
        Ok(self.watch(move || source.clone(), callback, options.deep(true)))
    }
}
