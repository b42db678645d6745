//! # Prometheus Fair Queues
//!
//! A hierarchical fair-share queue tree for cluster schedulers.
//!
//! Applications are admitted into leaf queues; leaves hang off composite
//! queues, which hang off a single root. A pluggable [`SchedulingPolicy`]
//! decides how each composite splits its fair share among its children and
//! in which order they are offered containers. The tree itself does the
//! bookkeeping:
//!
//! - **Demand** is aggregated bottom-up and clamped to each queue's
//!   configured maximum.
//! - **Fair shares** are handed down from the root; each composite asks its
//!   policy to split its own share.
//! - **Assignment** offers a node to children in policy order and stops at
//!   the first child that grants a container.
//! - **Preemption** walks down to the child the policy ranks highest and
//!   returns a container handle for an external actor to reclaim.
//!
//! Every node guards its own state with a reader/writer lock
//! ([`rwlock::NodeLock`]), always acquired parent before child, so passes
//! over disjoint subtrees run in parallel.
//!
//! ## Building and driving a tree
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_fair_queues::builders::{build_queue_tree, in_memory_leaves};
//! use prometheus_fair_queues::config::AllocationConfig;
//! use prometheus_fair_queues::core::{Queue, ResourceVector, SchedulerNode};
//! use prometheus_fair_queues::runtime::SchedulingDriver;
//!
//! let cfg = AllocationConfig::from_json_str(r#"{
//!     "queues": {
//!         "root.eng": { "weight": 2.0 },
//!         "root.ops": { "max_resources": { "memory-mb": 4096, "vcores": 4 } }
//!     }
//! }"#)?;
//! let tree = build_queue_tree(&cfg, |name| my_policies(name), in_memory_leaves())?;
//!
//! let driver = SchedulingDriver::new(Arc::clone(tree.root()), ResourceVector::new(16_384, 16));
//! let mut nodes = vec![SchedulerNode::new("n1", "/rack1", ResourceVector::new(8_192, 8))];
//!
//! // update_demand -> recompute_shares -> assign_container per node -> preempt_container
//! let report = driver.with_preemption(true).run_cycle(&mut nodes, now_ms());
//! ```
//!
//! For complete examples, see:
//! - `tests/tree_test.rs` - end-to-end tree scenarios
//! - `tests/concurrency_test.rs` - concurrent passes and structural changes
//!
//! [`SchedulingPolicy`]: core::SchedulingPolicy

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core queue-tree abstractions and resource accounting.
pub mod core;
/// Allocation configuration and the provider contract.
pub mod config;
/// Builders to construct queue trees from configuration.
pub mod builders;
/// Leaf queue implementations.
pub mod infra;
/// Scheduling driver, periodic update loop, and API surface.
pub mod runtime;
/// Per-node reader/writer lock.
pub mod rwlock;
/// Shared utilities.
pub mod util;
