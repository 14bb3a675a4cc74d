//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a [`Dep`](super::Dep) can notify: plain effects,
//! the inner effect of a computed value, watchers and render effects. All of
//! them are [`ReactiveEffect`](super::ReactiveEffect)s underneath; the
//! [`EffectKind`] tag tells the notifier which pass they belong to.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::Dep;

/// Unique identifier for an effect.
///
/// Each effect gets an ID when created. Deps are keyed by it, which is what
/// gives them set semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which notification pass a subscriber belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// An ordinary effect, watcher or render effect.
    Plain,
    /// The inner effect of a computed value. Notified before plain effects
    /// so that plain effects never read a stale cache.
    Derived,
}

/// Type-erased view of an effect, as stored in deps and on the observer
/// stack.
pub(crate) trait Subscriber {
    fn id(&self) -> EffectId;

    fn kind(&self) -> EffectKind;

    fn is_active(&self) -> bool;

    /// Remember that this subscriber was added to `dep`, so it can detach
    /// itself later.
    fn record_dep(&self, dep: &Dep);

    /// React to a change in one of the subscriber's dependencies.
    fn notify(self: Rc<Self>);

    /// Re-run the body, discarding its result.
    fn rerun(self: Rc<Self>);
}

/// Handle passed to custom schedulers.
///
/// A scheduler decides *when* a notified effect re-runs. It gets a `Runner`
/// so it can re-run the effect itself, now or later.
#[derive(Clone)]
pub struct Runner {
    effect: Rc<dyn Subscriber>,
}

impl Runner {
    pub(crate) fn new(effect: Rc<dyn Subscriber>) -> Self {
        Self { effect }
    }

    /// ID of the effect this runner drives.
    pub fn id(&self) -> EffectId {
        self.effect.id()
    }

    /// Whether the effect is still active.
    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    /// Re-run the effect. No-op once the effect is stopped.
    pub fn run(&self) {
        Rc::clone(&self.effect).rerun();
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn effect_ids_display_with_hash() {
        let id = EffectId(12);
        assert_eq!(id.to_string(), "#12");
    }
}
