//! Build a queue tree from an [`AllocationConfig`].
//!
//! Every configured name is a path rooted at `root`. A name becomes a
//! [`CompositeQueue`] if it is `root`, if another configured name lies below
//! it, or if its entry sets `parent: true`; every other name becomes a leaf
//! produced by the caller's leaf factory. Intermediate paths that are not
//! configured themselves are created as composites with default settings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::allocation::{ancestors, parent_name, ROOT_QUEUE};
use crate::config::AllocationConfig;
use crate::core::{
    CompositeQueue, InMemoryQueueMetrics, Queue, QueueContext, QueueError, QueueMetrics,
    SchedulingPolicy,
};
use crate::infra::leaf::InMemoryLeafQueue;

/// Policy name used when neither the queue nor the file names one.
pub const DEFAULT_POLICY: &str = "fair";

const FINISHED_APP_HISTORY: usize = 1024;

/// A built queue tree: the root plus name lookups for every node.
///
/// `L` is the leaf type returned by the leaf factory, kept concrete so
/// callers can reach leaf-specific operations such as submission.
pub struct QueueTree<L> {
    root: Arc<CompositeQueue>,
    composites: BTreeMap<String, Arc<CompositeQueue>>,
    leaves: BTreeMap<String, Arc<L>>,
    metrics: BTreeMap<String, Arc<InMemoryQueueMetrics>>,
    context: Arc<QueueContext>,
}

impl<L: Queue + 'static> QueueTree<L> {
    /// The root queue.
    pub const fn root(&self) -> &Arc<CompositeQueue> {
        &self.root
    }

    /// Shared context of every queue in this tree.
    pub const fn context(&self) -> &Arc<QueueContext> {
        &self.context
    }

    /// Look up any queue by path.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Queue>> {
        if let Some(composite) = self.composites.get(name) {
            return Some(Arc::clone(composite) as Arc<dyn Queue>);
        }
        self.leaves
            .get(name)
            .map(|leaf| Arc::clone(leaf) as Arc<dyn Queue>)
    }

    /// Look up a composite queue by path.
    pub fn composite(&self, name: &str) -> Option<&Arc<CompositeQueue>> {
        self.composites.get(name)
    }

    /// Look up a leaf queue by path.
    pub fn leaf(&self, name: &str) -> Option<&Arc<L>> {
        self.leaves.get(name)
    }

    /// Metrics sink installed on `name`.
    pub fn metrics(&self, name: &str) -> Option<&Arc<InMemoryQueueMetrics>> {
        self.metrics.get(name)
    }

    /// Every queue path, composites and leaves, in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.composites.keys().chain(self.leaves.keys()).collect();
        all.into_iter().cloned().collect()
    }

    /// Create a leaf at `name` under an existing composite and attach it.
    ///
    /// # Errors
    /// [`QueueError::DuplicateQueue`] if `name` already exists,
    /// [`QueueError::UnknownParent`] if its parent path is not a composite
    /// in this tree, or whatever the leaf factory reports.
    pub fn create_leaf<FL>(
        &mut self,
        name: &str,
        policy: Arc<dyn SchedulingPolicy>,
        mut leaf_factory: FL,
    ) -> Result<Arc<L>, QueueError>
    where
        FL: FnMut(
            &str,
            &Arc<CompositeQueue>,
            Arc<dyn QueueMetrics>,
            Arc<dyn SchedulingPolicy>,
        ) -> Result<Arc<L>, QueueError>,
    {
        if self.composites.contains_key(name) || self.leaves.contains_key(name) {
            return Err(QueueError::DuplicateQueue(name.to_string()));
        }
        let parent = parent_name(name)
            .and_then(|p| self.composites.get(p))
            .cloned()
            .ok_or_else(|| QueueError::UnknownParent(name.to_string()))?;
        let metrics = self.child_metrics(name, parent.name());
        let leaf = leaf_factory(name, &parent, metrics, policy)?;
        parent.add_child_queue(Arc::clone(&leaf) as Arc<dyn Queue>);
        self.leaves.insert(name.to_string(), Arc::clone(&leaf));
        Ok(leaf)
    }

    /// Validate `cfg` and make it the active configuration. The shape of the
    /// tree is not changed; queues configured in `cfg` but absent from the
    /// tree are reported and ignored.
    ///
    /// # Errors
    /// [`QueueError::InvalidConfig`] if `cfg` fails validation. The active
    /// configuration is left in place.
    pub fn reload(&self, cfg: AllocationConfig) -> Result<(), QueueError> {
        cfg.validate().map_err(QueueError::InvalidConfig)?;
        for name in cfg.queues.keys() {
            if self.get(name).is_none() {
                tracing::warn!(queue = %name, "reloaded configuration names a queue not in the tree");
            }
        }
        self.context.reload(Arc::new(cfg));
        Ok(())
    }

    fn child_metrics(&mut self, name: &str, parent: &str) -> Arc<dyn QueueMetrics> {
        let mut sink = InMemoryQueueMetrics::new(name, FINISHED_APP_HISTORY);
        if let Some(parent) = self.metrics.get(parent) {
            sink = sink.with_parent(Arc::clone(parent) as Arc<dyn QueueMetrics>);
        }
        let sink = Arc::new(sink);
        self.metrics.insert(name.to_string(), Arc::clone(&sink));
        sink
    }
}

impl<L> std::fmt::Debug for QueueTree<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTree")
            .field("composites", &self.composites.keys().collect::<Vec<_>>())
            .field("leaves", &self.leaves.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Build a queue tree from allocation configuration using provided
/// factories.
///
/// `policy_factory` resolves a policy name to an instance; it is called once
/// per queue. `leaf_factory` creates each leaf from its path, its parent, a
/// metrics sink chained to the parent's, and the resolved policy.
///
/// # Errors
/// [`QueueError::InvalidConfig`] if `cfg` fails validation, or any error the
/// factories or queue constructors report (for example
/// [`QueueError::PolicyNotApplicable`] when a policy is configured at a depth
/// it does not support).
pub fn build_queue_tree<L, FP, FL>(
    cfg: &AllocationConfig,
    mut policy_factory: FP,
    mut leaf_factory: FL,
) -> Result<QueueTree<L>, QueueError>
where
    L: Queue + 'static,
    FP: FnMut(&str) -> Result<Arc<dyn SchedulingPolicy>, QueueError>,
    FL: FnMut(
        &str,
        &Arc<CompositeQueue>,
        Arc<dyn QueueMetrics>,
        Arc<dyn SchedulingPolicy>,
    ) -> Result<Arc<L>, QueueError>,
{
    cfg.validate().map_err(QueueError::InvalidConfig)?;

    // Parents sort before their children because a parent path is a prefix.
    let mut names: BTreeSet<&str> = BTreeSet::new();
    let mut composite_names: BTreeSet<&str> = BTreeSet::new();
    names.insert(ROOT_QUEUE);
    composite_names.insert(ROOT_QUEUE);
    for (name, queue_cfg) in &cfg.queues {
        names.extend(ancestors(name));
        composite_names.extend(ancestors(name).skip(1));
        if queue_cfg.parent {
            composite_names.insert(name.as_str());
        }
    }

    let context = Arc::new(QueueContext::new(Arc::new(cfg.clone())));
    let root_metrics = Arc::new(InMemoryQueueMetrics::new(ROOT_QUEUE, FINISHED_APP_HISTORY));
    let root = CompositeQueue::root(
        Arc::clone(&context),
        Arc::clone(&root_metrics) as Arc<dyn QueueMetrics>,
        policy_factory(policy_name(cfg, ROOT_QUEUE))?,
    )?;

    let mut tree = QueueTree {
        root: Arc::clone(&root),
        composites: BTreeMap::from([(ROOT_QUEUE.to_string(), root)]),
        leaves: BTreeMap::new(),
        metrics: BTreeMap::from([(ROOT_QUEUE.to_string(), root_metrics)]),
        context,
    };

    for name in names.into_iter().filter(|n| *n != ROOT_QUEUE) {
        let parent = parent_name(name)
            .and_then(|p| tree.composites.get(p))
            .cloned()
            .ok_or_else(|| QueueError::UnknownParent(name.to_string()))?;
        let policy = policy_factory(policy_name(cfg, name))?;
        if composite_names.contains(name) {
            let metrics = tree.child_metrics(name, parent.name());
            let queue = CompositeQueue::child(name, &parent, metrics, policy)?;
            parent.add_child_queue(Arc::clone(&queue) as Arc<dyn Queue>);
            tree.composites.insert(name.to_string(), queue);
        } else {
            tree.create_leaf(name, policy, &mut leaf_factory)?;
        }
    }

    tracing::info!(
        composites = tree.composites.len(),
        leaves = tree.leaves.len(),
        "queue tree built"
    );
    Ok(tree)
}

fn policy_name<'a>(cfg: &'a AllocationConfig, queue: &str) -> &'a str {
    cfg.queue(queue)
        .and_then(|q| q.policy.as_deref())
        .or(cfg.default_policy.as_deref())
        .unwrap_or(DEFAULT_POLICY)
}

/// Leaf factory producing [`InMemoryLeafQueue`]s.
pub fn in_memory_leaves() -> impl FnMut(
    &str,
    &Arc<CompositeQueue>,
    Arc<dyn QueueMetrics>,
    Arc<dyn SchedulingPolicy>,
) -> Result<Arc<InMemoryLeafQueue>, QueueError> {
    |name, parent, metrics, policy| InMemoryLeafQueue::new(name, parent, metrics, policy)
}
