//! Error types for the reactive runtime.
//!
//! Most "odd" situations in the engine are not errors at all: reading
//! outside of an effect, triggering a key nobody observed, or stopping an
//! effect twice are all silent no-ops. The variants below cover the cases
//! where a caller broke the contract and should hear about it.

use thiserror::Error;

use crate::reactive::EffectId;
use crate::scheduler::JobId;

/// Errors raised by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A stopped effect was run directly.
    #[error("effect {0} has been stopped and can no longer run")]
    EffectStopped(EffectId),

    /// A watcher was built from something that is neither a getter nor a
    /// reactive object.
    #[error("invalid watch source: expected a reactive object, got {0}")]
    InvalidWatchSource(&'static str),

    /// A pre-flush job kept re-queueing itself during a single flush.
    #[error("job {job} was queued more than {limit} times in one flush")]
    RecursionLimitExceeded {
        /// The offending job.
        job: JobId,
        /// The configured limit.
        limit: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
