//! Shared policies and fixtures for integration tests.
#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::Arc;

use prometheus_fair_queues::core::{
    PolicyScope, Queue, QueueError, ResourceVector, SchedulerNode, SchedulingPolicy,
};
use prometheus_fair_queues::util::serde::{ApplicationAttemptId, ApplicationId};

/// Splits shares by weight and offers containers to the queue with the
/// lowest memory usage relative to its fair share.
pub struct WeightedFair;

impl WeightedFair {
    fn split(queues: &[Arc<dyn Queue>], total: &ResourceVector) -> Vec<ResourceVector> {
        let sum: f64 = queues.iter().map(|q| q.weight()).sum();
        queues
            .iter()
            .map(|q| {
                if sum > 0.0 {
                    total.scale(q.weight() / sum)
                } else {
                    ResourceVector::zero()
                }
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn usage_ratio(q: &dyn Queue) -> f64 {
    let fair = q.fair_share().memory_mb().max(1) as f64;
    q.resource_usage().memory_mb() as f64 / fair
}

impl SchedulingPolicy for WeightedFair {
    fn name(&self) -> &str {
        "fair"
    }

    fn is_applicable_to(&self, _scope: PolicyScope) -> bool {
        true
    }

    fn compute_shares(&self, queues: &[Arc<dyn Queue>], total: &ResourceVector) {
        for (q, share) in queues.iter().zip(Self::split(queues, total)) {
            q.set_fair_share(share);
        }
    }

    fn compute_steady_shares(&self, queues: &[Arc<dyn Queue>], total: &ResourceVector) {
        for (q, share) in queues.iter().zip(Self::split(queues, total)) {
            q.set_steady_fair_share(share);
        }
    }

    fn compare(&self, a: &dyn Queue, b: &dyn Queue) -> Ordering {
        usage_ratio(a).total_cmp(&usage_ratio(b))
    }
}

/// Leaf-only policy serving applications in arrival order.
pub struct Fifo;

impl SchedulingPolicy for Fifo {
    fn name(&self) -> &str {
        "fifo"
    }

    fn is_applicable_to(&self, scope: PolicyScope) -> bool {
        scope == PolicyScope::Leaf
    }

    fn compute_shares(&self, _queues: &[Arc<dyn Queue>], _total: &ResourceVector) {}

    fn compute_steady_shares(&self, _queues: &[Arc<dyn Queue>], _total: &ResourceVector) {}

    fn compare(&self, _a: &dyn Queue, _b: &dyn Queue) -> Ordering {
        Ordering::Equal
    }
}

/// Resolve a policy name used in test configurations.
pub fn policies(name: &str) -> Result<Arc<dyn SchedulingPolicy>, QueueError> {
    match name {
        "fair" => Ok(Arc::new(WeightedFair)),
        "fifo" => Ok(Arc::new(Fifo)),
        other => Err(QueueError::UnknownPolicy(other.to_string())),
    }
}

pub fn attempt(id: u64) -> ApplicationAttemptId {
    ApplicationAttemptId::new(ApplicationId(id), 1)
}

pub fn node(id: &str, memory_mb: u64, vcores: u64) -> SchedulerNode {
    SchedulerNode::new(id, "/default-rack", ResourceVector::new(memory_mb, vcores))
}
