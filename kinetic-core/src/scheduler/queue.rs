//! Pre-flush Job Queue
//!
//! The queue holds deferred jobs until the host reaches its flush point.
//!
//! # Algorithm
//!
//! 1. `enqueue` inserts a job unless a job with the same ID is pending.
//! 2. `flush` pops the oldest pending job and runs it, until the queue is
//!    empty. A job may re-queue itself (or others) while running; those run
//!    later in the same flush.
//! 3. Every run is counted per job. Exceeding the limit clears the queue and
//!    reports [`ReactiveError::RecursionLimitExceeded`].
//!
//! A nested `flush` (a job flushing from inside a flush) is a no-op; the
//! outer loop drains whatever the job queued.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{ReactiveError, Result};

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Generate a new unique job ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of deferred work.
///
/// Cloning a job keeps its ID, so clones deduplicate against each other.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Rc<dyn Fn()>,
}

impl Job {
    /// Create a job with a fresh ID.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_id(JobId::new(), run)
    }

    /// Create a job with a caller-chosen ID.
    pub fn with_id<F>(id: JobId, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id,
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Run the job now.
    pub fn run(&self) {
        (self.run)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

/// Resets the flushing flag even if a job panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// The pre-flush job queue.
pub struct JobQueue {
    /// Pending jobs, in enqueue order, keyed by ID.
    pending: RefCell<IndexMap<JobId, Job>>,

    /// Whether a flush is in progress.
    flushing: Cell<bool>,

    /// How many times one job may run within a single flush.
    recursion_limit: usize,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new(recursion_limit: usize) -> Self {
        Self {
            pending: RefCell::new(IndexMap::new()),
            flushing: Cell::new(false),
            recursion_limit,
        }
    }

    /// Queue a job. Returns `false` if it is already pending.
    pub fn enqueue(&self, job: Job) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.contains_key(&job.id) {
            return false;
        }
        pending.insert(job.id, job);
        true
    }

    /// Whether a job with this ID is pending.
    pub fn contains(&self, id: JobId) -> bool {
        self.pending.borrow().contains_key(&id)
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Run pending jobs until the queue is empty.
    ///
    /// Returns the number of jobs that ran.
    pub fn flush(&self) -> Result<usize> {
        if self.flushing.get() {
            return Ok(0);
        }
        self.flushing.set(true);
        let _guard = FlushGuard(&self.flushing);

        let mut runs: HashMap<JobId, usize> = HashMap::new();
        let mut ran = 0;

        loop {
            // The borrow must end before the job runs: jobs may enqueue.
            let next = self.pending.borrow_mut().shift_remove_index(0);
            let Some((id, job)) = next else {
                break;
            };

            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > self.recursion_limit {
                self.pending.borrow_mut().clear();
                warn!(job = %id, limit = self.recursion_limit, "recursion limit exceeded");
                return Err(ReactiveError::RecursionLimitExceeded {
                    job: id,
                    limit: self.recursion_limit,
                });
            }

            job.run();
            ran += 1;
        }

        if ran > 0 {
            debug!(ran, "flushed pre-flush jobs");
        }
        Ok(ran)
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.len())
            .field("flushing", &self.is_flushing())
            .field("recursion_limit", &self.recursion_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_job(counter: &Rc<Cell<usize>>) -> Job {
        let counter = counter.clone();
        Job::new(move || counter.set(counter.get() + 1))
    }

    #[test]
    fn pending_jobs_are_deduplicated() {
        let queue = JobQueue::new(100);
        let counter = Rc::new(Cell::new(0));
        let job = counter_job(&counter);

        assert!(queue.enqueue(job.clone()));
        assert!(!queue.enqueue(job.clone()));
        assert!(!queue.enqueue(job.clone()));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(job.id()));

        assert_eq!(queue.flush().unwrap(), 1);
        assert_eq!(counter.get(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn jobs_run_in_enqueue_order() {
        let queue = JobQueue::new(100);
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = log.clone();
            queue.enqueue(Job::new(move || log.borrow_mut().push(name)));
        }

        queue.flush().unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn jobs_queued_during_flush_run_in_same_flush() {
        let queue = Rc::new(JobQueue::new(100));
        let counter = Rc::new(Cell::new(0));
        let follow_up = counter_job(&counter);

        let job = {
            let queue = queue.clone();
            Job::new(move || {
                queue.enqueue(follow_up.clone());
            })
        };
        queue.enqueue(job);

        assert_eq!(queue.flush().unwrap(), 2);
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn nested_flush_is_noop() {
        let queue = Rc::new(JobQueue::new(100));
        let nested = Rc::new(Cell::new(None));

        let job = {
            let queue = queue.clone();
            let nested = nested.clone();
            Job::new(move || nested.set(Some(queue.flush())))
        };
        queue.enqueue(job);
        queue.flush().unwrap();

        assert_eq!(nested.take(), Some(Ok(0)));
        assert!(!queue.is_flushing());
    }

    #[test]
    fn self_requeueing_job_hits_recursion_limit() {
        let queue = Rc::new(JobQueue::new(5));
        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Job>>> = Rc::default();

        let job = {
            let queue = Rc::downgrade(&queue);
            let slot = slot.clone();
            let runs = runs.clone();
            Job::new(move || {
                runs.set(runs.get() + 1);
                let again = slot.borrow().clone();
                if let (Some(queue), Some(job)) = (queue.upgrade(), again) {
                    queue.enqueue(job);
                }
            })
        };
        *slot.borrow_mut() = Some(job.clone());
        queue.enqueue(job.clone());

        let err = queue.flush().unwrap_err();
        assert_eq!(
            err,
            ReactiveError::RecursionLimitExceeded {
                job: job.id(),
                limit: 5
            }
        );
        assert_eq!(runs.get(), 5);
        assert!(queue.is_empty());
        assert!(!queue.is_flushing());
    }
}
