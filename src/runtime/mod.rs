//! Scheduling driver and API surface.

pub mod api;
pub mod driver;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_driver;

pub use api::{health, list_queues, snapshot, Health, QueueListing, QueueSnapshot};
pub use driver::{CycleReport, NodeAssignment, SchedulingDriver, DEFAULT_MAX_ASSIGN_PER_NODE};
#[cfg(feature = "tokio-runtime")]
pub use tokio_driver::spawn_update_loop;
