//! Composite (non-leaf) queues.
//!
//! A [`CompositeQueue`] owns an ordered list of child queues and:
//!
//! * aggregates demand bottom-up, clamped to the configured maximum;
//! * derives resource usage as the live sum of its children;
//! * hands its fair share to the policy to split among the children, then
//!   recurses;
//! * offers each container to children in policy order, stopping at the
//!   first grant;
//! * delegates preemption to the child the policy ranks highest.
//!
//! # Locking
//!
//! Each composite has one [`NodeLock`] guarding its child list, its demand,
//! and its runnable-application count. Recursive passes hold that guard while
//! descending, so `add_child_queue`/`remove_child_queue` on an ancestor wait
//! for any in-flight pass rooted there. Children are visited sequentially in
//! list order; there is no fan-out across siblings.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::core::{
    ContainerHandle, PolicyScope, Queue, QueueBase, QueueContext, QueueError, QueueMetrics,
    QueueUserAclInfo, ResourceVector, SchedulerNode, SchedulingPolicy,
};
use crate::rwlock::NodeLock;
use crate::util::serde::ApplicationAttemptId;

struct CompositeState {
    /// Insertion order, re-sorted in place by the policy on every assignment.
    children: Vec<Arc<dyn Queue>>,
    demand: ResourceVector,
    runnable_apps: usize,
}

/// A queue whose only members are other queues.
pub struct CompositeQueue {
    base: QueueBase,
    state: NodeLock<CompositeState>,
}

impl CompositeQueue {
    /// Create the root of a tree.
    ///
    /// # Errors
    /// [`QueueError::PolicyNotApplicable`] if `policy` is not a root policy.
    pub fn root(
        context: Arc<QueueContext>,
        metrics: Arc<dyn QueueMetrics>,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<Arc<Self>, QueueError> {
        Self::build(crate::config::allocation::ROOT_QUEUE, None, context, metrics, policy)
    }

    /// Create a composite queue under `parent`. The new queue is not attached;
    /// call [`CompositeQueue::add_child_queue`] on the parent.
    ///
    /// # Errors
    /// [`QueueError::PolicyNotApplicable`] if `policy` is not an
    /// intermediate policy.
    pub fn child(
        name: impl Into<String>,
        parent: &Arc<Self>,
        metrics: Arc<dyn QueueMetrics>,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<Arc<Self>, QueueError> {
        let context = Arc::clone(parent.base.context());
        Self::build(name, Some(parent), context, metrics, policy)
    }

    fn build(
        name: impl Into<String>,
        parent: Option<&Arc<Self>>,
        context: Arc<QueueContext>,
        metrics: Arc<dyn QueueMetrics>,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<Arc<Self>, QueueError> {
        let scope = if parent.is_none() {
            PolicyScope::Root
        } else {
            PolicyScope::Intermediate
        };
        let base = QueueBase::new(name, parent, context, metrics, Arc::clone(&policy));
        base.install_policy(scope, policy)?;
        Ok(Arc::new(Self {
            base,
            state: NodeLock::new(CompositeState {
                children: Vec::new(),
                demand: ResourceVector::zero(),
                runnable_apps: 0,
            }),
        }))
    }

    /// Append `child` to the end of the child list.
    pub fn add_child_queue(&self, child: Arc<dyn Queue>) {
        let name = child.name().to_string();
        self.state.write().children.push(child);
        tracing::info!(queue = self.base.name(), child = %name, "added child queue");
    }

    /// Detach the child named `name`. Returns it if it was present.
    pub fn remove_child_queue(&self, name: &str) -> Option<Arc<dyn Queue>> {
        let removed = {
            let mut state = self.state.write();
            let idx = state.children.iter().position(|c| c.name() == name)?;
            state.children.remove(idx)
        };
        tracing::info!(queue = self.base.name(), child = name, "removed child queue");
        Some(removed)
    }

    /// Distribute the steady fair share among children and recurse into
    /// composite children. Leaves have nothing further to split.
    pub fn recompute_steady_shares(&self) {
        let state = self.state.read();
        self.policy()
            .compute_steady_shares(&state.children, &self.steady_fair_share());
        for child in &state.children {
            child
                .metrics()
                .set_steady_fair_share(&child.steady_fair_share());
            if let Some(composite) = child.as_composite() {
                composite.recompute_steady_shares();
            }
        }
    }

    /// Count one more runnable application in this subtree.
    pub fn increment_runnable_apps(&self) {
        self.state.write().runnable_apps += 1;
    }

    /// Count one fewer runnable application in this subtree.
    pub fn decrement_runnable_apps(&self) {
        let mut state = self.state.write();
        if state.runnable_apps == 0 {
            tracing::warn!(
                queue = self.base.name(),
                "runnable application count decremented below zero"
            );
            return;
        }
        state.runnable_apps -= 1;
    }

    /// Dry run of one assignment pass: the children the next
    /// [`Queue::assign_container`] would offer a container to, in order,
    /// restricted to those with unmet demand. The live child order is not
    /// touched.
    pub fn simulate_schedule(&self) -> Vec<Arc<dyn Queue>> {
        let policy = self.policy();
        let mut queues = self.child_queues();
        queues.sort_by(|a, b| policy.compare(a.as_ref(), b.as_ref()));
        queues.retain(|q| !q.demand().fits_in(&q.resource_usage()));
        queues
    }
}

impl Queue for CompositeQueue {
    fn base(&self) -> &QueueBase {
        &self.base
    }

    fn demand(&self) -> ResourceVector {
        self.state.read().demand.clone()
    }

    fn update_demand(&self) {
        let max = self.max_share();
        let mut state = self.state.write();
        let mut demand = ResourceVector::zero();
        let mut pinned = false;
        for child in &state.children {
            // Once every capped dimension sits at the cap, later children
            // can only move dimensions the cap leaves out, so their last
            // known demand is counted without a refresh.
            if !pinned {
                child.update_demand();
            }
            let to_add = child.demand();
            debug!(
                queue = self.base.name(),
                child = child.name(),
                %to_add,
                total = %demand,
                "counting child demand"
            );
            demand = demand.add(&to_add);
            if let Some(max) = &max {
                demand = demand.clamp_to(max);
                pinned = pinned || (!max.is_zero() && max.fits_in(&demand));
            }
        }
        state.demand = demand;
        debug!(
            queue = self.base.name(),
            demand = %state.demand,
            max = ?max,
            "updated demand"
        );
    }

    fn resource_usage(&self) -> ResourceVector {
        let state = self.state.read();
        state
            .children
            .iter()
            .fold(ResourceVector::zero(), |acc, c| acc.add(&c.resource_usage()))
    }

    fn recompute_shares(&self) {
        let state = self.state.read();
        self.policy()
            .compute_shares(&state.children, &self.fair_share());
        for child in &state.children {
            child.metrics().set_fair_share(&child.fair_share());
            child.recompute_shares();
        }
    }

    fn assign_container(&self, node: &SchedulerNode) -> ResourceVector {
        if !self.assign_container_pre_check(node) {
            return ResourceVector::zero();
        }

        let policy = self.policy();
        self.state
            .write()
            .children
            .sort_by(|a, b| policy.compare(a.as_ref(), b.as_ref()));

        let state = self.state.read();
        for child in &state.children {
            let assigned = child.assign_container(node);
            if !assigned.is_zero() {
                return assigned;
            }
        }
        ResourceVector::zero()
    }

    fn preempt_container(&self) -> Option<ContainerHandle> {
        let candidate = {
            let policy = self.policy();
            let state = self.state.read();
            let mut candidate: Option<&Arc<dyn Queue>> = None;
            for queue in &state.children {
                let replace = candidate.is_none_or(|current| {
                    policy.compare(queue.as_ref(), current.as_ref()) == Ordering::Greater
                });
                if replace {
                    candidate = Some(queue);
                }
            }
            candidate.cloned()
        };
        candidate.and_then(|queue| queue.preempt_container())
    }

    fn collect_scheduler_applications(&self, apps: &mut Vec<ApplicationAttemptId>) {
        let state = self.state.read();
        for child in &state.children {
            child.collect_scheduler_applications(apps);
        }
    }

    fn queue_user_acl_info(&self, user: &str) -> Vec<QueueUserAclInfo> {
        let mut acls = vec![self.user_acl_info(user)];
        let state = self.state.read();
        for child in &state.children {
            acls.extend(child.queue_user_acl_info(user));
        }
        acls
    }

    fn num_runnable_apps(&self) -> usize {
        self.state.read().runnable_apps
    }

    fn as_composite(&self) -> Option<&CompositeQueue> {
        Some(self)
    }

    fn child_queues(&self) -> Vec<Arc<dyn Queue>> {
        self.state.read().children.clone()
    }

    fn update_preemption_variables(&self, now_ms: u128) {
        self.base
            .update_preemption_variables(&self.resource_usage(), &self.demand(), now_ms);
        let state = self.state.read();
        for child in &state.children {
            child.update_preemption_variables(now_ms);
        }
    }
}

impl std::fmt::Debug for CompositeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeQueue")
            .field("name", &self.base.name())
            .field("children", &self.state.read().children.len())
            .finish()
    }
}
