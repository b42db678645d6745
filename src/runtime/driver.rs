//! The external scheduling driver.
//!
//! One [`SchedulingDriver::update`] runs the periodic pass on the root
//! (demand, then fair shares, then preemption timestamps). One
//! [`SchedulingDriver::run_cycle`] follows it with container assignment on
//! each node and, when enabled, a single preemption selection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{CompositeQueue, ContainerHandle, Queue, ResourceVector, SchedulerNode};

/// Upper bound on containers granted to one node in one cycle.
pub const DEFAULT_MAX_ASSIGN_PER_NODE: usize = 64;

/// Resources granted on one node during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAssignment {
    /// Node the containers were placed on.
    pub node_id: String,
    /// Number of containers granted.
    pub containers: usize,
    /// Sum of the granted resources.
    pub resource: ResourceVector,
}

/// Outcome of one [`SchedulingDriver::run_cycle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Sequence number of the cycle, starting at 1.
    pub cycle: u64,
    /// Root demand after the update pass.
    pub demand: ResourceVector,
    /// Per-node grants, only for nodes that received something.
    pub assignments: Vec<NodeAssignment>,
    /// Container chosen for preemption, if preemption ran and found one.
    pub preemption: Option<ContainerHandle>,
}

impl CycleReport {
    /// Sum of everything granted in the cycle.
    pub fn total_assigned(&self) -> ResourceVector {
        self.assignments
            .iter()
            .fold(ResourceVector::zero(), |acc, a| acc.add(&a.resource))
    }
}

/// Drives a queue tree through update and scheduling cycles.
pub struct SchedulingDriver {
    root: Arc<CompositeQueue>,
    cluster_capacity: Mutex<ResourceVector>,
    preemption_enabled: AtomicBool,
    max_assign_per_node: usize,
    cycles: AtomicU64,
}

impl SchedulingDriver {
    /// Create a driver for `root` on a cluster of the given capacity. The
    /// steady fair shares are computed immediately.
    pub fn new(root: Arc<CompositeQueue>, cluster_capacity: ResourceVector) -> Self {
        let driver = Self {
            root,
            cluster_capacity: Mutex::new(ResourceVector::zero()),
            preemption_enabled: AtomicBool::new(false),
            max_assign_per_node: DEFAULT_MAX_ASSIGN_PER_NODE,
            cycles: AtomicU64::new(0),
        };
        driver.set_cluster_capacity(cluster_capacity);
        driver
    }

    /// Enable or disable preemption selection at the end of each cycle.
    #[must_use]
    pub fn with_preemption(self, enabled: bool) -> Self {
        self.preemption_enabled.store(enabled, Ordering::Release);
        self
    }

    /// Cap the containers granted to one node per cycle. Zero is treated
    /// as one.
    #[must_use]
    pub fn with_max_assign_per_node(mut self, max: usize) -> Self {
        self.max_assign_per_node = max.max(1);
        self
    }

    /// Root of the driven tree.
    pub const fn root(&self) -> &Arc<CompositeQueue> {
        &self.root
    }

    /// Current cluster capacity.
    pub fn cluster_capacity(&self) -> ResourceVector {
        self.cluster_capacity.lock().clone()
    }

    /// Toggle preemption at runtime.
    pub fn set_preemption_enabled(&self, enabled: bool) {
        self.preemption_enabled.store(enabled, Ordering::Release);
    }

    /// Record a new cluster capacity and redistribute steady fair shares.
    /// Call after nodes join or leave, or after the tree changes shape.
    pub fn set_cluster_capacity(&self, capacity: ResourceVector) {
        *self.cluster_capacity.lock() = capacity.clone();
        self.root.set_steady_fair_share(capacity.clone());
        self.root.metrics().set_steady_fair_share(&capacity);
        self.root.recompute_steady_shares();
        tracing::info!(%capacity, "cluster capacity updated");
    }

    /// Periodic pass: aggregate demand bottom-up, hand the cluster capacity
    /// to the root and split it top-down, then refresh preemption
    /// timestamps.
    pub fn update(&self, now_ms: u128) {
        let capacity = self.cluster_capacity();
        self.root.update_demand();
        self.root.set_fair_share(capacity.clone());
        self.root.metrics().set_fair_share(&capacity);
        self.root.recompute_shares();
        self.root.update_preemption_variables(now_ms);
        tracing::debug!(demand = %self.root.demand(), "update pass complete");
    }

    /// Run one full cycle: [`update`](Self::update), then offer every node
    /// to the root until it grants nothing, the node is exhausted, or the
    /// per-node cap is reached. Granted resources are subtracted from each
    /// node's `available`.
    pub fn run_cycle(&self, nodes: &mut [SchedulerNode], now_ms: u128) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        self.update(now_ms);

        let mut assignments = Vec::new();
        for node in nodes.iter_mut() {
            let mut granted = ResourceVector::zero();
            let mut containers = 0;
            while containers < self.max_assign_per_node && !node.available.is_zero() {
                let resource = self.root.assign_container(node);
                if resource.is_zero() {
                    break;
                }
                if !resource.fits_in(&node.available) {
                    tracing::warn!(
                        node = %node.node_id,
                        %resource,
                        available = %node.available,
                        "grant exceeds node availability"
                    );
                }
                node.available = node.available.saturating_sub(&resource);
                granted = granted.add(&resource);
                containers += 1;
            }
            if containers > 0 {
                tracing::debug!(node = %node.node_id, containers, %granted, "node scheduled");
                assignments.push(NodeAssignment {
                    node_id: node.node_id.clone(),
                    containers,
                    resource: granted,
                });
            }
        }

        let preemption = if self.preemption_enabled.load(Ordering::Acquire) {
            let victim = self.root.preempt_container();
            if let Some(victim) = &victim {
                tracing::info!(
                    container = %victim.container,
                    queue = %victim.queue,
                    resource = %victim.resource,
                    "container selected for preemption"
                );
            }
            victim
        } else {
            None
        };

        CycleReport {
            cycle,
            demand: self.root.demand(),
            assignments,
            preemption,
        }
    }
}

impl std::fmt::Debug for SchedulingDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulingDriver")
            .field("root", &self.root.name())
            .field("cluster_capacity", &self.cluster_capacity())
            .field("preemption_enabled", &self.preemption_enabled.load(Ordering::Acquire))
            .field("max_assign_per_node", &self.max_assign_per_node)
            .finish_non_exhaustive()
    }
}
