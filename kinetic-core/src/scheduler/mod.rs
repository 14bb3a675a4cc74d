//! Job Scheduling
//!
//! This module implements the host-side job queue that deferred consumers
//! (watchers in particular) push work into.
//!
//! # Overview
//!
//! The reactive core never suspends: `trigger` runs to completion
//! synchronously. Deferral happens only here. A consumer whose scheduler
//! queues a [`Job`] instead of re-running has its work postponed until the
//! host calls [`Runtime::flush_pre_flush_jobs`](crate::Runtime::flush_pre_flush_jobs),
//! typically right before it patches its output.
//!
//! # Design Decisions
//!
//! 1. Jobs are deduplicated by identity while pending, so any number of
//!    synchronous triggers before a flush collapse into one run.
//!
//! 2. Jobs run one at a time, in enqueue order. Jobs queued while a flush is
//!    in progress run in the same flush.
//!
//! 3. A job that keeps re-queueing itself aborts the flush once it exceeds
//!    the runtime's recursion limit, instead of spinning forever.

mod queue;

pub use queue::{Job, JobId, JobQueue};
