//! Error types for queue-tree operations.
//!
//! Running out of capacity is not an error: assignment returns the zero
//! vector and preemption returns `None`. Only configuration faults surface
//! here.

use thiserror::Error;

/// Errors produced by queue-tree components.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A policy was installed at a depth it does not declare itself
    /// applicable to. The queue's installed policy is left unchanged.
    #[error("policy '{policy}' is not applicable to queue '{queue}'")]
    PolicyNotApplicable {
        /// Name of the rejected policy.
        policy: String,
        /// Queue the policy was offered to.
        queue: String,
    },
    /// Allocation configuration failed to parse or validate.
    #[error("invalid allocation configuration: {0}")]
    InvalidConfig(String),
    /// A policy factory could not resolve a policy name.
    #[error("unknown scheduling policy: '{0}'")]
    UnknownPolicy(String),
    /// Two queues with the same path were configured.
    #[error("duplicate queue: '{0}'")]
    DuplicateQueue(String),
    /// A queue's parent path does not resolve to a composite queue.
    #[error("parent of queue '{0}' is missing or is not a parent queue")]
    UnknownParent(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
