//! The queue capability shared by every node of the tree.
//!
//! Composite and leaf queues both implement [`Queue`]. State that every node
//! carries (name, parent link, policy, fair shares, metrics sink) lives in
//! [`QueueBase`], which implementors embed and expose through
//! [`Queue::base`].

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{
    CompositeQueue, PolicyScope, QueueContext, QueueError, QueueMetrics, ResourceVector,
    SchedulingPolicy,
};
use crate::util::clock::now_ms;
use crate::util::serde::{ApplicationAttemptId, ContainerId};

/// Operations guarded by queue ACLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAcl {
    /// Submit applications to the queue.
    SubmitApplications,
    /// Administer the queue and the applications in it.
    AdministerQueue,
}

impl QueueAcl {
    /// Every defined operation, in reporting order.
    pub const ALL: [Self; 2] = [Self::SubmitApplications, Self::AdministerQueue];
}

/// Operations one user may perform on one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueUserAclInfo {
    /// Short (last path segment) queue name.
    pub queue_name: String,
    /// Permitted operations.
    pub user_acls: Vec<QueueAcl>,
}

/// A cluster machine offering capacity to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerNode {
    /// Node identifier.
    pub node_id: String,
    /// Rack the node sits in, used as a locality hint.
    pub rack: String,
    /// Unallocated capacity.
    pub available: ResourceVector,
    /// Container currently holding a reservation on this node, if any.
    pub reserved: Option<ContainerId>,
}

impl SchedulerNode {
    /// A node with free capacity and no reservation.
    pub fn new(node_id: impl Into<String>, rack: impl Into<String>, available: ResourceVector) -> Self {
        Self {
            node_id: node_id.into(),
            rack: rack.into(),
            available,
            reserved: None,
        }
    }
}

/// A running container selected for preemption. The eviction itself is
/// carried out by whoever receives the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    /// Container to reclaim.
    pub container: ContainerId,
    /// Leaf queue the container runs in.
    pub queue: String,
    /// Resources the container holds.
    pub resource: ResourceVector,
}

/// Last times a queue was not starved, used to pace preemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreemptionTimestamps {
    /// Last time usage reached `min(min_share, demand)`.
    pub last_time_at_min_share: u128,
    /// Last time usage reached `min(fair_share * threshold, demand)`.
    pub last_time_at_fair_share_threshold: u128,
}

#[derive(Debug)]
struct ShareState {
    fair_share: ResourceVector,
    steady_fair_share: ResourceVector,
    preemption: PreemptionTimestamps,
}

/// State common to every queue node.
pub struct QueueBase {
    name: String,
    parent: Option<Weak<CompositeQueue>>,
    context: Arc<QueueContext>,
    metrics: Arc<dyn QueueMetrics>,
    policy: RwLock<Arc<dyn SchedulingPolicy>>,
    shares: RwLock<ShareState>,
}

impl QueueBase {
    /// Create base state. `parent` is `None` only for the root. The initial
    /// policy is not scope-checked; use [`QueueBase::install_policy`] for that.
    pub fn new(
        name: impl Into<String>,
        parent: Option<&Arc<CompositeQueue>>,
        context: Arc<QueueContext>,
        metrics: Arc<dyn QueueMetrics>,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Self {
        let now = now_ms();
        Self {
            name: name.into(),
            parent: parent.map(Arc::downgrade),
            context,
            metrics,
            policy: RwLock::new(policy),
            shares: RwLock::new(ShareState {
                fair_share: ResourceVector::zero(),
                steady_fair_share: ResourceVector::zero(),
                preemption: PreemptionTimestamps {
                    last_time_at_min_share: now,
                    last_time_at_fair_share_threshold: now,
                },
            }),
        }
    }

    /// Path-qualified name, e.g. `root.eng.web`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment, e.g. `web`.
    pub fn queue_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Parent queue, if it is still alive. The link never keeps it alive.
    pub fn parent(&self) -> Option<Arc<CompositeQueue>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// True for the tree's root.
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Shared scheduler context.
    pub const fn context(&self) -> &Arc<QueueContext> {
        &self.context
    }

    /// This queue's metrics sink.
    pub fn metrics(&self) -> Arc<dyn QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Installed scheduling policy.
    pub fn policy(&self) -> Arc<dyn SchedulingPolicy> {
        Arc::clone(&self.policy.read())
    }

    /// Install `policy` if it declares itself applicable to `scope`. On
    /// rejection the installed policy is left untouched.
    pub fn install_policy(
        &self,
        scope: PolicyScope,
        policy: Arc<dyn SchedulingPolicy>,
    ) -> Result<(), QueueError> {
        if !policy.is_applicable_to(scope) {
            tracing::warn!(
                queue = %self.name,
                policy = policy.name(),
                %scope,
                "rejected scheduling policy"
            );
            return Err(QueueError::PolicyNotApplicable {
                policy: policy.name().to_string(),
                queue: self.name.clone(),
            });
        }
        tracing::info!(queue = %self.name, policy = policy.name(), "installed scheduling policy");
        *self.policy.write() = policy;
        Ok(())
    }

    /// Current fair share.
    pub fn fair_share(&self) -> ResourceVector {
        self.shares.read().fair_share.clone()
    }

    /// Overwrite the fair share. Called by the parent's policy.
    pub fn set_fair_share(&self, share: ResourceVector) {
        self.shares.write().fair_share = share;
    }

    /// Current steady fair share.
    pub fn steady_fair_share(&self) -> ResourceVector {
        self.shares.read().steady_fair_share.clone()
    }

    /// Overwrite the steady fair share. Called by the parent's policy.
    pub fn set_steady_fair_share(&self, share: ResourceVector) {
        self.shares.write().steady_fair_share = share;
    }

    /// Last non-starved timestamps.
    pub fn preemption_timestamps(&self) -> PreemptionTimestamps {
        self.shares.read().preemption
    }

    /// Refresh the non-starved timestamps from the given usage and demand.
    pub fn update_preemption_variables(
        &self,
        usage: &ResourceVector,
        demand: &ResourceVector,
        now_ms: u128,
    ) {
        let allocation = self.context.allocation();
        let min_share = allocation.min_resources(&self.name);
        let threshold = allocation.fair_share_preemption_threshold(&self.name);

        let mut shares = self.shares.write();
        if min_share.component_min(demand).fits_in(usage) {
            shares.preemption.last_time_at_min_share = now_ms;
        }
        let fair_target = shares.fair_share.scale(threshold).component_min(demand);
        if fair_target.fits_in(usage) {
            shares.preemption.last_time_at_fair_share_threshold = now_ms;
        }
    }
}

impl fmt::Debug for QueueBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueBase")
            .field("name", &self.name)
            .field("root", &self.is_root())
            .finish_non_exhaustive()
    }
}

/// Capability set implemented by every queue, composite or leaf.
///
/// Recursive operations acquire locks top-down only. While an ancestor is
/// visiting a queue it may hold its own node guard for writing
/// (`update_demand`, the sort in `assign_container`), and write guards are
/// not reentrant, so implementations must not read or write any ancestor's
/// node-guarded state (demand, usage, child list, runnable count) from
/// inside a visit. Shares, policy, metrics, and configuration live outside
/// the node guard and are always safe to read.
pub trait Queue: Send + Sync {
    /// Shared node state.
    fn base(&self) -> &QueueBase;

    /// Current demand, as of the last [`Queue::update_demand`].
    fn demand(&self) -> ResourceVector;

    /// Recompute demand bottom-up.
    fn update_demand(&self);

    /// Resources currently held, computed live.
    fn resource_usage(&self) -> ResourceVector;

    /// Distribute this queue's fair share below it.
    fn recompute_shares(&self);

    /// Try to place at most one container on `node`. Returns the resources
    /// granted, or zero.
    fn assign_container(&self, node: &SchedulerNode) -> ResourceVector;

    /// Pick a container to reclaim, if any.
    fn preempt_container(&self) -> Option<ContainerHandle>;

    /// Append the live attempt of every application in this subtree.
    fn collect_scheduler_applications(&self, apps: &mut Vec<ApplicationAttemptId>);

    /// One ACL entry per queue in this subtree for `user`.
    fn queue_user_acl_info(&self, user: &str) -> Vec<QueueUserAclInfo>;

    /// Applications eligible to run in this subtree.
    fn num_runnable_apps(&self) -> usize;

    /// Downcast to a composite queue.
    fn as_composite(&self) -> Option<&CompositeQueue> {
        None
    }

    /// Direct children snapshot. Leaves have none.
    fn child_queues(&self) -> Vec<Arc<dyn Queue>> {
        Vec::new()
    }

    /// Path-qualified name.
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Parent queue, if any and still alive.
    fn parent(&self) -> Option<Arc<CompositeQueue>> {
        self.base().parent()
    }

    /// Metrics sink.
    fn metrics(&self) -> Arc<dyn QueueMetrics> {
        self.base().metrics()
    }

    /// Installed scheduling policy.
    fn policy(&self) -> Arc<dyn SchedulingPolicy> {
        self.base().policy()
    }

    /// Depth class used to validate policies.
    fn policy_scope(&self) -> PolicyScope {
        match (self.as_composite().is_some(), self.base().is_root()) {
            (true, true) => PolicyScope::Root,
            (true, false) => PolicyScope::Intermediate,
            (false, _) => PolicyScope::Leaf,
        }
    }

    /// Install a policy after checking its declared scope.
    ///
    /// # Errors
    /// [`QueueError::PolicyNotApplicable`] when the policy does not apply at
    /// this depth.
    fn set_policy(&self, policy: Arc<dyn SchedulingPolicy>) -> Result<(), QueueError> {
        self.base().install_policy(self.policy_scope(), policy)
    }

    /// Current fair share.
    fn fair_share(&self) -> ResourceVector {
        self.base().fair_share()
    }

    /// Set the fair share.
    fn set_fair_share(&self, share: ResourceVector) {
        self.base().set_fair_share(share);
    }

    /// Current steady fair share.
    fn steady_fair_share(&self) -> ResourceVector {
        self.base().steady_fair_share()
    }

    /// Set the steady fair share.
    fn set_steady_fair_share(&self, share: ResourceVector) {
        self.base().set_steady_fair_share(share);
    }

    /// Configured guaranteed minimum.
    fn min_share(&self) -> ResourceVector {
        self.base().context().allocation().min_resources(self.name())
    }

    /// Configured maximum, `None` when unbounded.
    fn max_share(&self) -> Option<ResourceVector> {
        self.base().context().allocation().max_resources(self.name())
    }

    /// Weight relative to siblings.
    fn weight(&self) -> f64 {
        self.base().context().allocation().weight(self.name())
    }

    /// Whether `user` may perform `acl` here.
    fn has_access(&self, acl: QueueAcl, user: &str) -> bool {
        self.base()
            .context()
            .allocation()
            .has_access(self.name(), acl, user)
    }

    /// This queue's own ACL entry for `user`.
    fn user_acl_info(&self, user: &str) -> QueueUserAclInfo {
        QueueUserAclInfo {
            queue_name: self.base().queue_name().to_string(),
            user_acls: QueueAcl::ALL
                .into_iter()
                .filter(|acl| self.has_access(*acl, user))
                .collect(),
        }
    }

    /// Whether this queue may take a container on `node` at all: usage must
    /// fit within the configured maximum and the node must not be reserved.
    fn assign_container_pre_check(&self, node: &SchedulerNode) -> bool {
        if node.reserved.is_some() {
            return false;
        }
        self.max_share()
            .is_none_or(|max| self.resource_usage().fits_under(&max))
    }

    /// Refresh preemption timestamps for this queue.
    fn update_preemption_variables(&self, now_ms: u128) {
        self.base()
            .update_preemption_variables(&self.resource_usage(), &self.demand(), now_ms);
    }
}

impl fmt::Debug for dyn Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name())
            .field("composite", &self.as_composite().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AllocationConfig, QueueConfig};
    use crate::core::InMemoryQueueMetrics;
    use std::cmp::Ordering;

    struct RootOnly;

    impl SchedulingPolicy for RootOnly {
        fn name(&self) -> &str {
            "root-only"
        }
        fn is_applicable_to(&self, scope: PolicyScope) -> bool {
            scope == PolicyScope::Root
        }
        fn compute_shares(&self, _: &[Arc<dyn Queue>], _: &ResourceVector) {}
        fn compute_steady_shares(&self, _: &[Arc<dyn Queue>], _: &ResourceVector) {}
        fn compare(&self, _: &dyn Queue, _: &dyn Queue) -> Ordering {
            Ordering::Equal
        }
    }

    fn base(name: &str, cfg: AllocationConfig) -> QueueBase {
        QueueBase::new(
            name,
            None,
            Arc::new(QueueContext::new(Arc::new(cfg))),
            Arc::new(InMemoryQueueMetrics::new(name, 8)),
            Arc::new(RootOnly),
        )
    }

    #[test]
    fn test_queue_name_is_last_segment() {
        let b = base("root.eng.web", AllocationConfig::default());
        assert_eq!(b.queue_name(), "web");
        assert_eq!(b.name(), "root.eng.web");
        assert!(b.is_root());
    }

    #[test]
    fn test_install_policy_rejects_wrong_scope() {
        let b = base("root.eng", AllocationConfig::default());
        let err = b
            .install_policy(PolicyScope::Intermediate, Arc::new(RootOnly))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "policy 'root-only' is not applicable to queue 'root.eng'"
        );
        assert!(b.install_policy(PolicyScope::Root, Arc::new(RootOnly)).is_ok());
    }

    #[test]
    fn test_preemption_timestamps() {
        let mut cfg = AllocationConfig::default();
        cfg.queues.insert(
            "root".into(),
            QueueConfig {
                min_resources: Some(ResourceVector::new(10, 0)),
                ..QueueConfig::default()
            },
        );
        let b = base("root", cfg);
        b.set_fair_share(ResourceVector::new(20, 0));
        let start = b.preemption_timestamps();

        // Starved on both counts: nothing moves.
        b.update_preemption_variables(&ResourceVector::new(4, 0), &ResourceVector::new(30, 0), start.last_time_at_min_share + 100);
        assert_eq!(b.preemption_timestamps(), start);

        // Usage meets the min share and half the fair share.
        b.update_preemption_variables(&ResourceVector::new(10, 0), &ResourceVector::new(30, 0), start.last_time_at_min_share + 200);
        let ts = b.preemption_timestamps();
        assert_eq!(ts.last_time_at_min_share, start.last_time_at_min_share + 200);
        assert_eq!(ts.last_time_at_fair_share_threshold, start.last_time_at_min_share + 200);
    }

    #[test]
    fn test_low_demand_is_never_starved() {
        let b = base("root", AllocationConfig::default());
        b.set_fair_share(ResourceVector::new(100, 10));
        let before = b.preemption_timestamps();
        b.update_preemption_variables(&ResourceVector::zero(), &ResourceVector::zero(), before.last_time_at_min_share + 5);
        assert_eq!(b.preemption_timestamps().last_time_at_fair_share_threshold, before.last_time_at_min_share + 5);
    }
}
