//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive objects,
//! effects, computed values and watchers. It owns the dependency registry,
//! the observer stack and the pre-flush job queue.
//!
//! # How It Works
//!
//! 1. When an effect runs, it is pushed onto the runtime's observer stack.
//!
//! 2. When reactive state is read, [`Runtime::track`] records the current
//!    observer in the [`Dep`] for that (target, key) pair.
//!
//! 3. When reactive state is written, [`Runtime::trigger`]:
//!    a. Looks up the dep for the slot (a missing entry is a no-op)
//!    b. Takes a snapshot of its subscribers
//!    c. Invalidates every derived effect reachable from the snapshot,
//!       collecting the plain effects they reach along the way
//!    d. Runs the collected plain effects once the derived pass is over
//!
//! # Scope
//!
//! Nothing here is global. Every runtime is an independent reactive
//! universe, and the handle is cheap to clone. Runtime state lives behind
//! `Rc`/`RefCell`, so a runtime and everything created from it stay on one
//! thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::dep::{Dep, Snapshot};
use super::subscriber::{EffectId, EffectKind, Subscriber};
use super::value::{Key, Value};
use crate::error::Result;
use crate::scheduler::{Job, JobQueue};

/// Default number of times one job may be re-queued within a single flush.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Identity of an observed object.
///
/// Targets are compared by identity, never by value: two objects with
/// identical contents still get distinct IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How many times a single job may run within one flush before the
    /// flush is aborted.
    pub recursion_limit: usize,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-flush recursion limit.
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

type KeyToDep = HashMap<Key, Dep>;

/// Plain effects waiting for the derived pass to finish, deduplicated.
type PlainBatch = IndexMap<EffectId, Rc<dyn Subscriber>>;

struct RuntimeInner {
    config: RuntimeConfig,
    context: ReactiveContext,
    targets: RefCell<HashMap<TargetId, KeyToDep>>,
    jobs: JobQueue,
    /// `Some` while a derived pass is running.
    batch: RefCell<Option<PlainBatch>>,
}

/// Handle to a reactive runtime.
///
/// Cloning the handle shares the runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ReactiveContext::default(),
                targets: RefCell::new(HashMap::new()),
                jobs: JobQueue::new(config.recursion_limit),
                batch: RefCell::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn context(&self) -> &ReactiveContext {
        &self.inner.context
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Return the dep for `(target, key)`, creating it if needed.
    ///
    /// Repeated calls with the same pair return handles to the same dep.
    pub fn get_or_create_dep(&self, target: TargetId, key: &Key) -> Dep {
        let mut targets = self.inner.targets.borrow_mut();
        let deps = targets.entry(target).or_default();
        if let Some(dep) = deps.get(key) {
            return dep.clone();
        }
        let dep = Dep::new();
        deps.insert(key.clone(), dep.clone());
        dep
    }

    /// Return the dep for `(target, key)` if anything ever tracked it.
    pub fn dep(&self, target: TargetId, key: &Key) -> Option<Dep> {
        self.inner
            .targets
            .borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .cloned()
    }

    /// Whether the registry holds an entry for `target`.
    pub fn has_target(&self, target: TargetId) -> bool {
        self.inner.targets.borrow().contains_key(&target)
    }

    /// Number of targets in the registry.
    pub fn target_count(&self) -> usize {
        self.inner.targets.borrow().len()
    }

    /// Drop the registry entry for `target`.
    ///
    /// Called when an observed object goes away.
    pub fn forget_target(&self, target: TargetId) {
        // Deps are dropped after the borrow is released.
        let removed = self.inner.targets.borrow_mut().remove(&target);
        if removed.is_some() {
            trace!(%target, "forgot target");
        }
    }

    // ------------------------------------------------------------------
    // Track / trigger
    // ------------------------------------------------------------------

    /// The ID of the effect currently collecting dependencies, if any.
    pub fn current_effect(&self) -> Option<EffectId> {
        self.context().current().map(|observer| observer.id())
    }

    /// Whether reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.context().current().is_some()
    }

    /// Run `f` with dependency tracking paused.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.context().enter(None);
        f()
    }

    /// Record a read of `(target, key)` by the current observer.
    ///
    /// No-op outside of an effect.
    pub fn track(&self, target: TargetId, key: &Key) {
        let Some(observer) = self.context().current() else {
            return;
        };
        let dep = self.get_or_create_dep(target, key);
        trace!(%target, %key, effect = %observer.id(), "track");
        Self::add_subscriber(&dep, &observer);
    }

    /// Record a read of a dep that lives outside the registry (for example
    /// the value of a computed).
    pub fn track_dep(&self, dep: &Dep) {
        if let Some(observer) = self.context().current() {
            Self::add_subscriber(dep, &observer);
        }
    }

    fn add_subscriber(dep: &Dep, observer: &Rc<dyn Subscriber>) {
        // A stopped effect that keeps reading must not join new deps.
        if !observer.is_active() {
            return;
        }
        if dep.add(observer) {
            observer.record_dep(dep);
        }
    }

    /// Notify everything that read `(target, key)`.
    ///
    /// No-op if the target or the key was never tracked.
    pub fn trigger(&self, target: TargetId, key: &Key, new_value: Option<&Value>) {
        let Some(dep) = self.dep(target, key) else {
            return;
        };
        debug!(%target, %key, ?new_value, "trigger");
        self.notify(dep.effects());
    }

    /// Notify the subscribers of a dep that lives outside the registry.
    pub fn trigger_dep(&self, dep: &Dep) {
        self.notify(dep.effects());
    }

    /// Walk a snapshot in two passes: derived effects first, then plain
    /// ones.
    ///
    /// Invalidating a computed triggers its own dep, which lands back here
    /// while the outer derived pass is still running. Those nested calls
    /// only invalidate further and queue their plain effects on the outer
    /// batch, so no plain effect runs before every reachable computed is
    /// dirty.
    fn notify(&self, subscribers: Snapshot) {
        if subscribers.is_empty() {
            return;
        }
        debug!(count = subscribers.len(), "notify");

        let (derived, plain): (Snapshot, Snapshot) = subscribers
            .into_iter()
            .partition(|sub| sub.kind() == EffectKind::Derived);

        let nested = self.inner.batch.borrow().is_some();
        if nested {
            for subscriber in derived {
                self.notify_one(subscriber);
            }
            self.defer(plain);
            return;
        }

        *self.inner.batch.borrow_mut() = Some(PlainBatch::new());
        for subscriber in derived {
            self.notify_one(subscriber);
        }
        self.defer(plain);
        let batch = self.inner.batch.borrow_mut().take().unwrap_or_default();

        for (_, subscriber) in batch {
            self.notify_one(subscriber);
        }
    }

    /// Queue plain subscribers on the running batch.
    fn defer(&self, plain: Snapshot) {
        if let Some(batch) = self.inner.batch.borrow_mut().as_mut() {
            for subscriber in plain {
                batch.entry(subscriber.id()).or_insert(subscriber);
            }
        }
    }

    fn notify_one(&self, subscriber: Rc<dyn Subscriber>) {
        if !subscriber.is_active() {
            return;
        }
        // An effect that writes a slot it reads must not recurse into itself.
        if self.context().is_running(subscriber.id()) {
            trace!(effect = %subscriber.id(), "skipped running effect");
            return;
        }
        subscriber.notify();
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Queue a job to run at the next pre-flush point.
    ///
    /// Returns `false` if the same job is already pending.
    pub fn queue_pre_flush(&self, job: Job) -> bool {
        self.inner.jobs.enqueue(job)
    }

    /// Run every pending pre-flush job. Returns how many jobs ran.
    pub fn flush_pre_flush_jobs(&self) -> Result<usize> {
        self.inner.jobs.flush()
    }

    /// Number of jobs waiting for the next flush.
    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Whether a pre-flush is currently running.
    pub fn is_flushing(&self) -> bool {
        self.inner.jobs.is_flushing()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("targets", &self.target_count())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}
