//! Reactive Primitives
//!
//! This module implements the core reactive system: dependency tracking,
//! effects, computed values, reactive objects and signals.
//!
//! # Concepts
//!
//! ## Deps and the registry
//!
//! Every observable slot (a key of a reactive object, a signal, the value of
//! a computed) has a [`Dep`]: the set of effects that read it. The
//! [`Runtime`] keeps a registry from `(target, key)` to `Dep`, filled lazily
//! the first time an effect reads the slot.
//!
//! ## Effects
//!
//! A [`ReactiveEffect`] is a computation that re-runs when something it read
//! changes. Its [`Scheduler`] decides whether that happens synchronously or
//! is handed off (watchers queue a job; computed values mark themselves
//! dirty).
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazily evaluated, cached derived value. Its inner
//! effect is tagged [`EffectKind::Derived`] and is notified before any plain
//! effect, so plain effects never observe a stale cache.
//!
//! # Implementation Notes
//!
//! The observer stack lives in the runtime, not in a thread-local. Reading
//! reactive state checks the top of that stack and, if an effect is
//! running, records the dependency on both sides.

mod computed;
mod context;
mod dep;
mod effect;
mod object;
mod runtime;
mod signal;
mod subscriber;
mod value;

pub use computed::{Computed, ComputedState};
pub use dep::Dep;
pub use effect::{EffectOptions, ReactiveEffect, Scheduler};
pub use object::ReactiveObject;
pub use runtime::{Runtime, RuntimeConfig, TargetId, DEFAULT_RECURSION_LIMIT};
pub use signal::Signal;
pub use subscriber::{EffectId, EffectKind, Runner};
pub use value::{Key, Value, WatchValue};
