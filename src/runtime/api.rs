//! API-facing status models.

use serde::{Deserialize, Serialize};

use crate::core::{PreemptionTimestamps, Queue, ResourceVector};

/// Point-in-time view of one queue and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Path-qualified queue name.
    pub name: String,
    /// Installed policy name.
    pub policy: String,
    /// Whether this is a composite queue.
    pub composite: bool,
    /// Aggregated demand from the last update pass.
    pub demand: ResourceVector,
    /// Live resource usage.
    pub usage: ResourceVector,
    /// Current fair share.
    pub fair_share: ResourceVector,
    /// Current steady fair share.
    pub steady_fair_share: ResourceVector,
    /// Configured minimum.
    pub min_share: ResourceVector,
    /// Configured maximum; `None` when unbounded.
    pub max_share: Option<ResourceVector>,
    /// Weight among siblings.
    pub weight: f64,
    /// Runnable applications in the subtree.
    pub runnable_apps: usize,
    /// Preemption pacing timestamps.
    pub preemption: PreemptionTimestamps,
    /// Child snapshots in current child order.
    pub children: Vec<QueueSnapshot>,
}

/// Queue listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListing {
    /// Path-qualified queue name.
    pub name: String,
    /// Depth below the root (root is 0).
    pub depth: usize,
    /// Whether this is a composite queue.
    pub composite: bool,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Number of queues in the tree.
    pub queues: usize,
}

/// Snapshot `queue` and everything below it. Each node is read under its
/// own lock in turn, so the result is consistent per node, not tree-wide.
pub fn snapshot(queue: &dyn Queue) -> QueueSnapshot {
    QueueSnapshot {
        name: queue.name().to_string(),
        policy: queue.policy().name().to_string(),
        composite: queue.as_composite().is_some(),
        demand: queue.demand(),
        usage: queue.resource_usage(),
        fair_share: queue.fair_share(),
        steady_fair_share: queue.steady_fair_share(),
        min_share: queue.min_share(),
        max_share: queue.max_share(),
        weight: queue.weight(),
        runnable_apps: queue.num_runnable_apps(),
        preemption: queue.base().preemption_timestamps(),
        children: queue
            .child_queues()
            .iter()
            .map(|child| snapshot(child.as_ref()))
            .collect(),
    }
}

/// List every queue under `root` in depth-first order.
pub fn list_queues(root: &dyn Queue) -> Vec<QueueListing> {
    fn walk(queue: &dyn Queue, depth: usize, out: &mut Vec<QueueListing>) {
        out.push(QueueListing {
            name: queue.name().to_string(),
            depth,
            composite: queue.as_composite().is_some(),
        });
        for child in queue.child_queues() {
            walk(child.as_ref(), depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out
}

/// Return a health payload for the tree under `root`.
pub fn health(root: &dyn Queue) -> Health {
    Health {
        ok: true,
        queues: list_queues(root).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{build_queue_tree, in_memory_leaves};
    use crate::config::{AllocationConfig, QueueConfig};
    use crate::core::{PolicyScope, SchedulingPolicy};
    use std::cmp::Ordering;
    use std::sync::Arc;

    struct Fifo;

    impl SchedulingPolicy for Fifo {
        fn name(&self) -> &str {
            "fifo"
        }
        fn is_applicable_to(&self, _scope: PolicyScope) -> bool {
            true
        }
        fn compute_shares(&self, _: &[Arc<dyn Queue>], _: &ResourceVector) {}
        fn compute_steady_shares(&self, _: &[Arc<dyn Queue>], _: &ResourceVector) {}
        fn compare(&self, _: &dyn Queue, _: &dyn Queue) -> Ordering {
            Ordering::Equal
        }
    }

    #[test]
    fn test_snapshot_and_listing() {
        let mut cfg = AllocationConfig::default();
        cfg.queues.insert("root.a.x".into(), QueueConfig::default());
        cfg.queues.insert(
            "root.b".into(),
            QueueConfig {
                max_resources: Some(ResourceVector::new(10, 2)),
                ..QueueConfig::default()
            },
        );
        let tree = build_queue_tree(
            &cfg,
            |_| Ok(Arc::new(Fifo) as Arc<dyn SchedulingPolicy>),
            in_memory_leaves(),
        )
        .unwrap();

        let listing = list_queues(tree.root().as_ref());
        let names: Vec<_> = listing.iter().map(|l| (l.name.as_str(), l.depth)).collect();
        assert_eq!(
            names,
            vec![("root", 0), ("root.a", 1), ("root.a.x", 2), ("root.b", 1)]
        );
        assert_eq!(health(tree.root().as_ref()).queues, 4);

        let snap = snapshot(tree.root().as_ref());
        assert!(snap.composite);
        assert_eq!(snap.policy, "fifo");
        assert_eq!(snap.children.len(), 2);
        assert_eq!(snap.children[1].max_share, Some(ResourceVector::new(10, 2)));
        assert!(!snap.children[1].composite);

        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"root.a.x\""));
    }
}
