//! Core queue-tree abstractions and resource accounting.

pub mod application;
pub mod composite;
pub mod context;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod queue;
pub mod resource;

pub use application::SchedulerApplication;
pub use composite::CompositeQueue;
pub use context::QueueContext;
pub use error::{AppResult, QueueError};
pub use metrics::{FinishedApp, InMemoryQueueMetrics, QueueMetrics};
pub use policy::{PolicyScope, SchedulingPolicy};
pub use queue::{
    ContainerHandle, PreemptionTimestamps, Queue, QueueAcl, QueueBase, QueueUserAclInfo,
    SchedulerNode,
};
pub use resource::ResourceVector;
