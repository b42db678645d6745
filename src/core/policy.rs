//! Pluggable scheduling-policy contract.
//!
//! A policy decides how a parent's share is split among its children and in
//! which order siblings are offered containers. The queue tree never
//! interprets the numbers a policy produces; it only propagates them.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::core::{Queue, ResourceVector};

/// Depth at which a policy is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyScope {
    /// The tree's root queue.
    Root,
    /// A composite queue below the root.
    Intermediate,
    /// A leaf queue ordering its applications.
    Leaf,
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Root => "root",
            Self::Intermediate => "intermediate",
            Self::Leaf => "leaf",
        };
        f.write_str(s)
    }
}

/// Strategy for share distribution and sibling ordering.
pub trait SchedulingPolicy: Send + Sync {
    /// Short policy name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the policy may be installed at `scope`.
    fn is_applicable_to(&self, scope: PolicyScope) -> bool;

    /// Split `total` among `queues`, writing each result with
    /// [`Queue::set_fair_share`].
    fn compute_shares(&self, queues: &[Arc<dyn Queue>], total: &ResourceVector);

    /// Split `total` among `queues`, writing each result with
    /// [`Queue::set_steady_fair_share`].
    fn compute_steady_shares(&self, queues: &[Arc<dyn Queue>], total: &ResourceVector);

    /// Ordering over siblings. [`Ordering::Less`] means `a` is offered a
    /// container before `b`; the maximum is the preemption candidate.
    ///
    /// During assignment the parent calls this while holding its own node
    /// guard for writing, and that guard is not reentrant. `compare` may
    /// read anything on `a`, `b`, and their subtrees, and the shares,
    /// weights, and configuration of any queue. It must not call
    /// [`Queue::demand`], [`Queue::resource_usage`],
    /// [`Queue::child_queues`], or [`Queue::num_runnable_apps`] on the
    /// parent or any other ancestor: the calling thread would block on its
    /// own guard.
    fn compare(&self, a: &dyn Queue, b: &dyn Queue) -> Ordering;
}

impl fmt::Debug for dyn SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingPolicy")
            .field("name", &self.name())
            .finish()
    }
}
