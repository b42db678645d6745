//! Per-queue metrics sinks.
//!
//! Provides the sink contract the queue tree pushes shares and application
//! completions into, plus an in-memory sink for testing and dev.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::ResourceVector;
use crate::util::clock::now_ms;
use crate::util::serde::AppFinalState;

/// Metrics sink owned by one queue.
pub trait QueueMetrics: Send + Sync {
    /// Record the queue's instantaneous fair share.
    fn set_fair_share(&self, share: &ResourceVector);
    /// Record the queue's steady fair share.
    fn set_steady_fair_share(&self, share: &ResourceVector);
    /// Record that one of `user`'s applications reached a terminal state.
    fn finish_app(&self, user: &str, state: AppFinalState);
}

/// One recorded application completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedApp {
    /// Queue whose sink recorded the event.
    pub queue: String,
    /// Submitting user.
    pub user: String,
    /// Terminal state.
    pub state: AppFinalState,
    /// Timestamp milliseconds.
    pub finished_at_ms: u128,
}

#[derive(Debug, Default)]
struct MetricsState {
    fair_share: ResourceVector,
    steady_fair_share: ResourceVector,
    finished: VecDeque<FinishedApp>,
    finished_by_state: HashMap<AppFinalState, u64>,
}

/// In-memory sink with a bounded completion log. Completions are forwarded
/// to the parent queue's sink when one is attached.
pub struct InMemoryQueueMetrics {
    queue: String,
    parent: Option<Arc<dyn QueueMetrics>>,
    max_events: usize,
    state: Mutex<MetricsState>,
}

impl InMemoryQueueMetrics {
    /// Create a sink for `queue` keeping at most `max_events` completions.
    pub fn new(queue: impl Into<String>, max_events: usize) -> Self {
        Self {
            queue: queue.into(),
            parent: None,
            max_events,
            state: Mutex::new(MetricsState::default()),
        }
    }

    /// Forward completions to `parent` as well.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<dyn QueueMetrics>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Last fair share pushed into this sink.
    pub fn fair_share(&self) -> ResourceVector {
        self.state.lock().fair_share.clone()
    }

    /// Last steady fair share pushed into this sink.
    pub fn steady_fair_share(&self) -> ResourceVector {
        self.state.lock().steady_fair_share.clone()
    }

    /// Retrieve a snapshot of recorded completions, oldest first.
    pub fn finished_apps(&self) -> Vec<FinishedApp> {
        self.state.lock().finished.iter().cloned().collect()
    }

    /// Total completions recorded in `state`, including evicted entries.
    pub fn finished_count(&self, state: AppFinalState) -> u64 {
        self.state
            .lock()
            .finished_by_state
            .get(&state)
            .copied()
            .unwrap_or(0)
    }
}

impl QueueMetrics for InMemoryQueueMetrics {
    fn set_fair_share(&self, share: &ResourceVector) {
        self.state.lock().fair_share = share.clone();
    }

    fn set_steady_fair_share(&self, share: &ResourceVector) {
        self.state.lock().steady_fair_share = share.clone();
    }

    fn finish_app(&self, user: &str, state: AppFinalState) {
        {
            let mut guard = self.state.lock();
            if guard.finished.len() >= self.max_events {
                guard.finished.pop_front();
            }
            guard.finished.push_back(FinishedApp {
                queue: self.queue.clone(),
                user: user.to_string(),
                state,
                finished_at_ms: now_ms(),
            });
            *guard.finished_by_state.entry(state).or_insert(0) += 1;
        }
        if let Some(parent) = &self.parent {
            parent.finish_app(user, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_are_recorded() {
        let m = InMemoryQueueMetrics::new("root.a", 4);
        m.set_fair_share(&ResourceVector::new(10, 1));
        m.set_steady_fair_share(&ResourceVector::new(20, 2));
        assert_eq!(m.fair_share(), ResourceVector::new(10, 1));
        assert_eq!(m.steady_fair_share(), ResourceVector::new(20, 2));
    }

    #[test]
    fn test_finish_app_overflow() {
        let m = InMemoryQueueMetrics::new("root.a", 2);
        m.finish_app("u1", AppFinalState::Finished);
        m.finish_app("u2", AppFinalState::Failed);
        m.finish_app("u3", AppFinalState::Finished);

        let events = m.finished_apps();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].user, "u2"); // First one popped
        assert_eq!(events[1].user, "u3");
        assert_eq!(m.finished_count(AppFinalState::Finished), 2);
        assert_eq!(m.finished_count(AppFinalState::Killed), 0);
    }

    #[test]
    fn test_finish_app_propagates_to_parent() {
        let root = Arc::new(InMemoryQueueMetrics::new("root", 8));
        let leaf = InMemoryQueueMetrics::new("root.a", 8).with_parent(root.clone());
        leaf.finish_app("alice", AppFinalState::Killed);

        assert_eq!(leaf.finished_count(AppFinalState::Killed), 1);
        assert_eq!(root.finished_count(AppFinalState::Killed), 1);
        assert_eq!(root.finished_apps()[0].queue, "root");
        assert!(root.finished_apps()[0].finished_at_ms > 0);
    }
}
