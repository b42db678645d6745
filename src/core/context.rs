//! Scheduler-wide context shared by every queue in one tree.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{AllocationConfig, AllocationProvider};

/// Shared handle to the active allocation configuration.
///
/// Queues read the provider at the start of each pass, so [`reload`]
/// takes effect on the next `update_demand`/`assign_container` call without
/// touching any queue lock.
///
/// [`reload`]: QueueContext::reload
pub struct QueueContext {
    allocation: RwLock<Arc<dyn AllocationProvider>>,
}

impl QueueContext {
    /// Create a context around `allocation`.
    pub fn new(allocation: Arc<dyn AllocationProvider>) -> Self {
        Self {
            allocation: RwLock::new(allocation),
        }
    }

    /// Context backed by an empty [`AllocationConfig`]: no limits, unit
    /// weights, open root ACLs.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::new(Arc::new(AllocationConfig::default()))
    }

    /// The provider currently in force.
    pub fn allocation(&self) -> Arc<dyn AllocationProvider> {
        Arc::clone(&self.allocation.read())
    }

    /// Swap in a new provider.
    pub fn reload(&self, allocation: Arc<dyn AllocationProvider>) {
        *self.allocation.write() = allocation;
        tracing::info!("allocation configuration reloaded");
    }
}

impl std::fmt::Debug for QueueContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueContext").finish_non_exhaustive()
    }
}
