//! Reactive Objects
//!
//! A [`ReactiveObject`] is a keyed container whose reads and writes are
//! routed through the runtime: every read calls [`Runtime::track`], every
//! effective write calls [`Runtime::trigger`].
//!
//! # Write Semantics
//!
//! - Writing a value that is the same (under same-value semantics) as the
//!   stored one triggers nothing.
//! - Adding a new key triggers the key and the iteration key, so effects
//!   that enumerate keys re-run.
//! - Removing a key triggers the key and the iteration key.
//!
//! # Lifetime
//!
//! The object's registry entry is removed when the last handle is dropped,
//! so unreachable objects do not leave deps behind.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::{Runtime, TargetId};
use super::value::{Key, Value, WatchValue};

struct ObjectInner {
    id: TargetId,
    runtime: Runtime,
    entries: RefCell<IndexMap<Key, Value>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        self.runtime.forget_target(self.id);
    }
}

/// An identity-compared reactive map from [`Key`] to [`Value`].
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<ObjectInner>,
}

impl ReactiveObject {
    /// Create an empty object.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: TargetId::new(),
                runtime: runtime.clone(),
                entries: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Create an object pre-populated with entries. Nothing is triggered.
    pub fn from_entries<K, V, I>(runtime: &Runtime, entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let object = Self::new(runtime);
        object.inner.entries.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        object
    }

    /// Identity of this object in the dependency registry.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a key, tracking it. Missing keys read as [`Value::Null`] and are
    /// tracked too, so adding them later re-runs the reader.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.inner.runtime.track(self.inner.id, &key);
        self.get_untracked(key)
    }

    /// Read a key without tracking it.
    pub fn get_untracked(&self, key: impl Into<Key>) -> Value {
        self.inner
            .entries
            .borrow()
            .get(&key.into())
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the key is present. Tracks the key.
    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.inner.runtime.track(self.inner.id, &key);
        self.inner.entries.borrow().contains_key(&key)
    }

    /// Write a key, notifying readers if the value changed.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let previous = self
            .inner
            .entries
            .borrow_mut()
            .insert(key.clone(), value.clone());

        match previous {
            None => {
                self.trigger(&key, Some(&value));
                self.trigger(&Key::Iterate, None);
            }
            Some(old) if !old.same_value(&value) => {
                self.trigger(&key, Some(&value));
            }
            Some(_) => {}
        }
    }

    /// Remove a key, notifying readers if it was present.
    pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let removed = self.inner.entries.borrow_mut().shift_remove(&key);
        if removed.is_some() {
            self.trigger(&key, None);
            self.trigger(&Key::Iterate, None);
        }
        removed
    }

    /// Keys in insertion order. Tracks the iteration key.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.runtime.track(self.inner.id, &Key::Iterate);
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Number of entries. Tracks the iteration key.
    pub fn len(&self) -> usize {
        self.inner.runtime.track(self.inner.id, &Key::Iterate);
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn trigger(&self, key: &Key, value: Option<&Value>) {
        self.inner.runtime.trigger(self.inner.id, key, value);
    }
}

impl fmt::Debug for ReactiveObject {
    // Entries are not printed: objects may reference each other in cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("len", &self.inner.entries.borrow().len())
            .finish()
    }
}

impl Runtime {
    /// Create an empty reactive object bound to this runtime.
    pub fn reactive(&self) -> ReactiveObject {
        ReactiveObject::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::EffectOptions;
    use std::cell::Cell;

    fn counting_effect(
        runtime: &Runtime,
        read: impl Fn() + 'static,
    ) -> (crate::reactive::ReactiveEffect<()>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let effect = runtime.effect(
            {
                let runs = runs.clone();
                move || {
                    read();
                    runs.set(runs.get() + 1);
                }
            },
            EffectOptions::default(),
        );
        (effect, runs)
    }

    #[test]
    fn reading_same_key_repeatedly_subscribes_once() {
        let runtime = Runtime::new();
        let state = runtime.reactive();

        let (effect, _) = counting_effect(&runtime, {
            let state = state.clone();
            move || {
                for _ in 0..5 {
                    state.get("a");
                }
            }
        });

        let dep = runtime.dep(state.id(), &Key::from("a")).unwrap();
        assert_eq!(dep.len(), 1);
        assert_eq!(dep.subscriber_ids(), vec![effect.id()]);
    }

    #[test]
    fn reads_outside_effects_are_not_tracked() {
        let runtime = Runtime::new();
        let state = ReactiveObject::from_entries(&runtime, [("a", 1_i32)]);

        assert_eq!(state.get("a"), Value::from(1_i32));
        assert!(!runtime.has_target(state.id()));
    }

    #[test]
    fn writing_same_value_does_not_trigger() {
        let runtime = Runtime::new();
        let state = ReactiveObject::from_entries(&runtime, [("a", f64::NAN)]);

        let (_effect, runs) = counting_effect(&runtime, {
            let state = state.clone();
            move || {
                state.get("a");
            }
        });

        state.set("a", f64::NAN);
        assert_eq!(runs.get(), 1);

        state.set("a", 0.0_f64);
        assert_eq!(runs.get(), 2);
        state.set("a", -0.0_f64);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn adding_and_removing_keys_triggers_iteration() {
        let runtime = Runtime::new();
        let state = runtime.reactive();

        let (_effect, runs) = counting_effect(&runtime, {
            let state = state.clone();
            move || {
                state.keys();
            }
        });

        state.set("a", 1_i32);
        assert_eq!(runs.get(), 2);

        // Updating an existing key does not change the key set.
        state.set("a", 2_i32);
        assert_eq!(runs.get(), 2);

        assert_eq!(state.remove("a"), Some(Value::from(2_i32)));
        assert_eq!(runs.get(), 3);
        assert_eq!(state.remove("a"), None);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn missing_keys_are_tracked() {
        let runtime = Runtime::new();
        let state = runtime.reactive();

        let (_effect, runs) = counting_effect(&runtime, {
            let state = state.clone();
            move || {
                state.contains_key("later");
            }
        });

        state.set("later", true);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dropping_object_removes_registry_entry() {
        let runtime = Runtime::new();
        let id = {
            let state = runtime.reactive();
            let (effect, _) = counting_effect(&runtime, {
                let state = state.clone();
                move || {
                    state.get("a");
                }
            });
            assert!(runtime.has_target(state.id()));
            drop(effect);
            state.id()
        };

        assert!(!runtime.has_target(id));
        assert_eq!(runtime.target_count(), 0);
    }

    #[test]
    fn objects_compare_by_identity() {
        let runtime = Runtime::new();
        let a = ReactiveObject::from_entries(&runtime, [("x", 1_i32)]);
        let b = ReactiveObject::from_entries(&runtime, [("x", 1_i32)]);

        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_ne!(Value::from(a.clone()), Value::from(b));
        assert_eq!(Value::from(a.clone()), Value::from(a));
    }
}
