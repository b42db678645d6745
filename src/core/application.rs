//! Binding of one admitted application to its queue.

use std::fmt;
use std::sync::Arc;

use crate::core::Queue;
use crate::util::serde::{AppFinalState, Priority};

/// An admitted application: its queue, submitting user, priority, and the
/// attempt currently running it.
///
/// Only the live attempt is tracked. `A` is the attempt type supplied by
/// the attempt manager.
pub struct SchedulerApplication<A> {
    queue: Arc<dyn Queue>,
    user: String,
    user_password: Option<String>,
    priority: Priority,
    current_attempt: Option<A>,
}

impl<A> SchedulerApplication<A> {
    /// Bind a new application to `queue`.
    pub fn new(
        queue: Arc<dyn Queue>,
        user: impl Into<String>,
        user_password: Option<String>,
        priority: Priority,
    ) -> Self {
        Self {
            queue,
            user: user.into(),
            user_password,
            priority,
            current_attempt: None,
        }
    }

    /// Queue the application is bound to.
    pub const fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    /// Rebind to another queue, e.g. on a queue move.
    pub fn set_queue(&mut self, queue: Arc<dyn Queue>) {
        tracing::debug!(from = self.queue.name(), to = queue.name(), user = %self.user, "moving application");
        self.queue = queue;
    }

    /// Submitting user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Credential supplied at submission, if any.
    pub fn user_password(&self) -> Option<&str> {
        self.user_password.as_deref()
    }

    /// Priority fixed at admission.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// The live attempt, if one has been started.
    pub const fn current_app_attempt(&self) -> Option<&A> {
        self.current_attempt.as_ref()
    }

    /// Replace the live attempt, returning the previous one.
    pub fn set_current_app_attempt(&mut self, attempt: A) -> Option<A> {
        self.current_attempt.replace(attempt)
    }

    /// Terminal transition: report the finish to the bound queue's metrics.
    /// Consumes the application.
    pub fn stop(self, final_state: AppFinalState) {
        tracing::info!(
            queue = self.queue.name(),
            user = %self.user,
            state = %final_state,
            "application stopped"
        );
        self.queue.metrics().finish_app(&self.user, final_state);
    }
}

impl<A: fmt::Debug> fmt::Debug for SchedulerApplication<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerApplication")
            .field("queue", &self.queue.name())
            .field("user", &self.user)
            .field("priority", &self.priority)
            .field("current_attempt", &self.current_attempt)
            .finish_non_exhaustive()
    }
}
