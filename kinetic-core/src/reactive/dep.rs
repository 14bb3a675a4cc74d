//! Dependency sets.
//!
//! A [`Dep`] is the set of effects interested in one observed slot. Deps
//! reference their subscribers weakly: an effect is owned by its handle, and
//! once every handle is gone the dead entry is pruned on the next snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::subscriber::{EffectId, Subscriber};

/// Snapshot of a dep's live subscribers, taken before notification.
pub(crate) type Snapshot = SmallVec<[Rc<dyn Subscriber>; 8]>;

/// The set of effects subscribed to one reactive source.
///
/// Cloning a `Dep` yields another handle to the same set.
#[derive(Clone, Default)]
pub struct Dep {
    subscribers: Rc<RefCell<IndexMap<EffectId, Weak<dyn Subscriber>>>>,
}

impl Dep {
    /// Create an empty dep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn add(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, Rc::downgrade(subscriber));
        true
    }

    /// Remove a subscriber by ID.
    pub fn remove(&self, id: EffectId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Whether the given effect is subscribed.
    pub fn contains(&self, id: EffectId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether no live subscriber remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of the live subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<EffectId> {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Take a snapshot of the current subscribers.
    ///
    /// The snapshot is detached from the live set, so effects that
    /// re-subscribe while it is being walked do not disturb the walk.
    pub(crate) fn effects(&self) -> Snapshot {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        subscribers.values().filter_map(Weak::upgrade).collect()
    }

    /// Whether two handles point at the same set.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.subscribers, &other.subscribers)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscriber_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::subscriber::EffectKind;
    use std::cell::Cell;

    struct MockSubscriber {
        id: EffectId,
        notified: Cell<usize>,
    }

    impl MockSubscriber {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: EffectId::new(),
                notified: Cell::new(0),
            })
        }
    }

    impl Subscriber for MockSubscriber {
        fn id(&self) -> EffectId {
            self.id
        }

        fn kind(&self) -> EffectKind {
            EffectKind::Plain
        }

        fn is_active(&self) -> bool {
            true
        }

        fn record_dep(&self, _dep: &Dep) {}

        fn notify(self: Rc<Self>) {
            self.notified.set(self.notified.get() + 1);
        }

        fn rerun(self: Rc<Self>) {}
    }

    #[test]
    fn add_has_set_semantics() {
        let dep = Dep::new();
        let sub: Rc<dyn Subscriber> = MockSubscriber::new();

        assert!(dep.add(&sub));
        assert!(!dep.add(&sub));
        assert!(!dep.add(&sub));

        assert_eq!(dep.len(), 1);
        assert!(dep.contains(sub.id()));
    }

    #[test]
    fn snapshot_is_decoupled_from_live_set() {
        let dep = Dep::new();
        let a: Rc<dyn Subscriber> = MockSubscriber::new();
        let b: Rc<dyn Subscriber> = MockSubscriber::new();
        dep.add(&a);

        let snapshot = dep.effects();
        dep.add(&b);
        dep.remove(a.id());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
        assert_eq!(dep.subscriber_ids(), vec![b.id()]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let dep = Dep::new();
        let kept: Rc<dyn Subscriber> = MockSubscriber::new();
        {
            let dropped: Rc<dyn Subscriber> = MockSubscriber::new();
            dep.add(&dropped);
            dep.add(&kept);
        }

        assert_eq!(dep.len(), 1);
        let snapshot = dep.effects();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), kept.id());
    }

    #[test]
    fn clones_share_the_same_set() {
        let dep = Dep::new();
        let alias = dep.clone();
        let sub: Rc<dyn Subscriber> = MockSubscriber::new();

        alias.add(&sub);
        assert!(dep.contains(sub.id()));
        assert!(dep.ptr_eq(&alias));
        assert!(!dep.ptr_eq(&Dep::new()));
    }
}
