//! In-memory leaf queue holding applications and their containers.
//!
//! Applications are served in submission order: each assignment grants the
//! next pending request of the first application whose request fits on the
//! node. Intended for development, tests, and simulation.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::{
    CompositeQueue, ContainerHandle, PolicyScope, Queue, QueueBase, QueueError, QueueMetrics,
    QueueUserAclInfo, ResourceVector, SchedulerNode, SchedulingPolicy,
};
use crate::rwlock::NodeLock;
use crate::util::serde::{ApplicationAttemptId, ContainerId};

#[derive(Debug, Clone)]
struct RunningContainer {
    id: ContainerId,
    resource: ResourceVector,
}

#[derive(Debug)]
struct LeafApp {
    attempt: ApplicationAttemptId,
    user: String,
    pending: VecDeque<ResourceVector>,
    running: Vec<RunningContainer>,
    next_sequence: u64,
}

impl LeafApp {
    fn usage(&self) -> ResourceVector {
        self.running
            .iter()
            .fold(ResourceVector::zero(), |acc, c| acc.add(&c.resource))
    }

    fn demand(&self) -> ResourceVector {
        self.pending.iter().fold(self.usage(), |acc, r| acc.add(r))
    }
}

#[derive(Debug, Default)]
struct LeafState {
    apps: Vec<LeafApp>,
    demand: ResourceVector,
}

/// Leaf queue keeping applications, pending requests, and running
/// containers in memory.
pub struct InMemoryLeafQueue {
    base: QueueBase,
    state: NodeLock<LeafState>,
}

impl InMemoryLeafQueue {
    /// Create a leaf under `parent`. The leaf is not attached; call
    /// [`CompositeQueue::add_child_queue`] on the parent.
    ///
    /// # Errors
    /// [`QueueError::PolicyNotApplicable`] if `policy` is not a leaf policy.
    pub fn new(
        name: impl Into<String>,
        parent: &Arc<CompositeQueue>,
        metrics: Arc<dyn QueueMetrics>,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<Arc<Self>, QueueError> {
        let context = Arc::clone(parent.base().context());
        let base = QueueBase::new(name, Some(parent), context, metrics, Arc::clone(&policy));
        base.install_policy(PolicyScope::Leaf, policy)?;
        Ok(Arc::new(Self {
            base,
            state: NodeLock::new(LeafState::default()),
        }))
    }

    /// Admit an application attempt and count it as runnable in every
    /// ancestor. Returns `false` if the attempt is already present.
    pub fn submit(&self, attempt: ApplicationAttemptId, user: impl Into<String>) -> bool {
        {
            let mut state = self.state.write();
            if state.apps.iter().any(|a| a.attempt == attempt) {
                return false;
            }
            state.apps.push(LeafApp {
                attempt,
                user: user.into(),
                pending: VecDeque::new(),
                running: Vec::new(),
                next_sequence: 1,
            });
        }
        // Own guard released before touching ancestors.
        self.for_each_ancestor(|parent| parent.increment_runnable_apps());
        tracing::debug!(queue = self.base.name(), %attempt, "application admitted");
        true
    }

    /// Queue a container request for `attempt`. Returns `false` if the
    /// attempt is unknown.
    pub fn request(&self, attempt: ApplicationAttemptId, resource: ResourceVector) -> bool {
        let mut state = self.state.write();
        let Some(app) = state.apps.iter_mut().find(|a| a.attempt == attempt) else {
            return false;
        };
        app.pending.push_back(resource);
        true
    }

    /// Remove `attempt` and everything it holds. Returns the submitting user
    /// if the attempt was present.
    pub fn finish(&self, attempt: ApplicationAttemptId) -> Option<String> {
        let removed = {
            let mut state = self.state.write();
            let idx = state.apps.iter().position(|a| a.attempt == attempt)?;
            state.apps.remove(idx)
        };
        self.for_each_ancestor(|parent| parent.decrement_runnable_apps());
        Some(removed.user)
    }

    /// Release a running container, e.g. after it completed or was
    /// preempted. Returns `false` if it is not running here.
    pub fn release_container(&self, container: ContainerId) -> bool {
        let mut state = self.state.write();
        let Some(app) = state
            .apps
            .iter_mut()
            .find(|a| a.attempt == container.attempt)
        else {
            return false;
        };
        let before = app.running.len();
        app.running.retain(|c| c.id != container);
        app.running.len() != before
    }

    /// Number of pending requests across all applications.
    pub fn pending_requests(&self) -> usize {
        self.state.read().apps.iter().map(|a| a.pending.len()).sum()
    }

    fn for_each_ancestor(&self, mut f: impl FnMut(&CompositeQueue)) {
        let mut next = self.base.parent();
        while let Some(parent) = next {
            f(parent.as_ref());
            next = parent.parent();
        }
    }
}

impl Queue for InMemoryLeafQueue {
    fn base(&self) -> &QueueBase {
        &self.base
    }

    fn demand(&self) -> ResourceVector {
        self.state.read().demand.clone()
    }

    fn update_demand(&self) {
        let max = self.max_share();
        let mut state = self.state.write();
        let total = state
            .apps
            .iter()
            .fold(ResourceVector::zero(), |acc, a| acc.add(&a.demand()));
        state.demand = match max {
            Some(max) => total.clamp_to(&max),
            None => total,
        };
    }

    fn resource_usage(&self) -> ResourceVector {
        self.state
            .read()
            .apps
            .iter()
            .fold(ResourceVector::zero(), |acc, a| acc.add(&a.usage()))
    }

    fn recompute_shares(&self) {
        // Applications share the leaf in submission order; nothing to split.
    }

    fn assign_container(&self, node: &SchedulerNode) -> ResourceVector {
        if !self.assign_container_pre_check(node) {
            return ResourceVector::zero();
        }
        let mut state = self.state.write();
        for app in &mut state.apps {
            let fits = app
                .pending
                .front()
                .is_some_and(|r| r.fits_in(&node.available));
            if !fits {
                continue;
            }
            let Some(resource) = app.pending.pop_front() else {
                continue;
            };
            let id = ContainerId {
                attempt: app.attempt,
                sequence: app.next_sequence,
            };
            app.next_sequence += 1;
            app.running.push(RunningContainer {
                id,
                resource: resource.clone(),
            });
            tracing::debug!(
                queue = self.base.name(),
                node = %node.node_id,
                container = %id,
                %resource,
                "assigned container"
            );
            return resource;
        }
        ResourceVector::zero()
    }

    fn preempt_container(&self) -> Option<ContainerHandle> {
        let state = self.state.read();
        // Largest consumer; on ties, the most recently admitted.
        let app = state
            .apps
            .iter()
            .filter(|a| !a.running.is_empty())
            .max_by_key(|a| {
                let usage = a.usage();
                (usage.memory_mb(), usage.vcores())
            })?;
        let newest = app.running.last()?;
        Some(ContainerHandle {
            container: newest.id,
            queue: self.base.name().to_string(),
            resource: newest.resource.clone(),
        })
    }

    fn collect_scheduler_applications(&self, apps: &mut Vec<ApplicationAttemptId>) {
        apps.extend(self.state.read().apps.iter().map(|a| a.attempt));
    }

    fn queue_user_acl_info(&self, user: &str) -> Vec<QueueUserAclInfo> {
        vec![self.user_acl_info(user)]
    }

    fn num_runnable_apps(&self) -> usize {
        self.state.read().apps.len()
    }
}

impl std::fmt::Debug for InMemoryLeafQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLeafQueue")
            .field("name", &self.base.name())
            .field("apps", &self.state.read().apps.len())
            .finish()
    }
}
