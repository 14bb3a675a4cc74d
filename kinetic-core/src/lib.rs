//! Kinetic Core
//!
//! This crate provides a fine-grained reactivity engine and a small virtual
//! tree renderer on top of it. It implements:
//!
//! - Dependency tracking between reactive state and the code that reads it
//! - Effects, lazily cached computed values and batched watchers
//! - A pre-flush job queue for deferred work
//! - A host-agnostic renderer driven by reactive effects
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Runtime, deps, effects, computed values, reactive objects
//! - `scheduler`: The pre-flush job queue
//! - `watch`: Watchers built on effects and the job queue
//! - `render`: Virtual nodes, the renderer and an in-memory host
//!
//! Everything hangs off a [`Runtime`]. There is no global state: two
//! runtimes never see each other's effects.
//!
//! # Example
//!
//! ```rust
//! use kinetic_core::{EffectOptions, Runtime, WatchOptions};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let runtime = Runtime::new();
//! let state = runtime.reactive();
//! state.set("count", 1_i32);
//!
//! // A derived value
//! let doubled = {
//!     let state = state.clone();
//!     runtime.computed(move || state.get("count").as_f64().unwrap_or_default() * 2.0)
//! };
//!
//! // An effect re-runs synchronously
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let _effect = runtime.effect(
//!     {
//!         let doubled = doubled.clone();
//!         let log = log.clone();
//!         move || log.borrow_mut().push(doubled.get())
//!     },
//!     EffectOptions::default(),
//! );
//!
//! // A watcher waits for the flush
//! let seen = Rc::new(RefCell::new(None));
//! let _watch = runtime.watch_computed(
//!     &doubled,
//!     {
//!         let seen = seen.clone();
//!         move |new: &f64, old: Option<&f64>| *seen.borrow_mut() = Some((*new, old.copied()))
//!     },
//!     WatchOptions::default(),
//! );
//!
//! state.set("count", 5_i32);
//! assert_eq!(*log.borrow(), vec![2.0, 10.0]);
//! assert_eq!(*seen.borrow(), None);
//!
//! runtime.flush_pre_flush_jobs().unwrap();
//! assert_eq!(*seen.borrow(), Some((10.0, Some(2.0))));
//! ```

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;
pub mod watch;

pub use error::{ReactiveError, Result};
pub use reactive::{
    Computed, EffectOptions, Key, ReactiveEffect, ReactiveObject, Runtime, RuntimeConfig, Signal,
    Value,
};
pub use watch::{WatchHandle, WatchOptions};
