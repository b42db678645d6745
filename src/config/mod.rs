//! Allocation configuration: per-queue limits, weights, policies, and ACLs.

pub mod allocation;

pub use allocation::{AllocationConfig, AllocationProvider, QueueConfig};
