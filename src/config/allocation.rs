//! Allocation file model and the configuration-provider contract.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::{QueueAcl, ResourceVector};

/// Name of the tree's root queue.
pub const ROOT_QUEUE: &str = "root";

/// ACL entry that admits every user.
pub const WILDCARD_ACL: &str = "*";

const fn default_weight() -> f64 {
    1.0
}

const fn default_threshold() -> f64 {
    0.5
}

/// Read access to per-queue allocation settings.
///
/// Queues consult the provider on every pass, so a reloaded provider takes
/// effect at the next demand or share recomputation.
pub trait AllocationProvider: Send + Sync {
    /// Configured maximum for `queue`. `None` means unbounded.
    fn max_resources(&self, queue: &str) -> Option<ResourceVector>;
    /// Configured guaranteed minimum for `queue` (zero when unset).
    fn min_resources(&self, queue: &str) -> ResourceVector;
    /// Relative weight of `queue` among its siblings.
    fn weight(&self, queue: &str) -> f64;
    /// Fraction of fair share below which `queue` counts as starved.
    fn fair_share_preemption_threshold(&self, queue: &str) -> f64;
    /// Whether `user` may perform `acl` on `queue`.
    fn has_access(&self, queue: &str, acl: QueueAcl, user: &str) -> bool;
}

/// Settings for a single queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Upper bound on the queue's demand and usage.
    #[serde(default)]
    pub max_resources: Option<ResourceVector>,
    /// Guaranteed share.
    #[serde(default)]
    pub min_resources: Option<ResourceVector>,
    /// Weight relative to siblings.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Scheduling policy name for this queue's children.
    #[serde(default)]
    pub policy: Option<String>,
    /// Users allowed per operation. `*` admits everyone.
    #[serde(default)]
    pub acls: HashMap<QueueAcl, Vec<String>>,
    /// Starvation threshold; inherited from the nearest ancestor when unset.
    #[serde(default)]
    pub fair_share_preemption_threshold: Option<f64>,
    /// Force a parent (composite) queue even without configured children.
    #[serde(default)]
    pub parent: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_resources: None,
            min_resources: None,
            weight: default_weight(),
            policy: None,
            acls: HashMap::new(),
            fair_share_preemption_threshold: None,
            parent: false,
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!("weight must be positive, got {}", self.weight));
        }
        if let Some(t) = self.fair_share_preemption_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!(
                    "fair_share_preemption_threshold must be within [0, 1], got {t}"
                ));
            }
        }
        if let (Some(min), Some(max)) = (&self.min_resources, &self.max_resources) {
            if !min.fits_under(max) {
                return Err(format!("min_resources {min} exceeds max_resources {max}"));
            }
        }
        Ok(())
    }
}

/// Root allocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Policy used by queues that do not name one.
    #[serde(default)]
    pub default_policy: Option<String>,
    /// Starvation threshold used when no queue on the path sets one.
    #[serde(default = "default_threshold")]
    pub default_fair_share_preemption_threshold: f64,
    /// Map of path-qualified queue name (`root.a.b`) to its settings.
    #[serde(default)]
    pub queues: BTreeMap<String, QueueConfig>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            default_policy: None,
            default_fair_share_preemption_threshold: default_threshold(),
            queues: BTreeMap::new(),
        }
    }
}

impl AllocationConfig {
    /// Validate every queue and its name.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.default_fair_share_preemption_threshold) {
            return Err(format!(
                "default_fair_share_preemption_threshold must be within [0, 1], got {}",
                self.default_fair_share_preemption_threshold
            ));
        }
        for (name, queue) in &self.queues {
            validate_queue_name(name)?;
            queue
                .validate()
                .map_err(|e| format!("queue `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse allocation configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Settings for `queue`, if configured.
    #[must_use]
    pub fn queue(&self, queue: &str) -> Option<&QueueConfig> {
        self.queues.get(queue)
    }
}

impl AllocationProvider for AllocationConfig {
    fn max_resources(&self, queue: &str) -> Option<ResourceVector> {
        self.queues.get(queue).and_then(|q| q.max_resources.clone())
    }

    fn min_resources(&self, queue: &str) -> ResourceVector {
        self.queues
            .get(queue)
            .and_then(|q| q.min_resources.clone())
            .unwrap_or_default()
    }

    fn weight(&self, queue: &str) -> f64 {
        self.queues.get(queue).map_or(default_weight(), |q| q.weight)
    }

    fn fair_share_preemption_threshold(&self, queue: &str) -> f64 {
        ancestors(queue)
            .find_map(|name| {
                self.queues
                    .get(name)
                    .and_then(|q| q.fair_share_preemption_threshold)
            })
            .unwrap_or(self.default_fair_share_preemption_threshold)
    }

    fn has_access(&self, queue: &str, acl: QueueAcl, user: &str) -> bool {
        let granted = ancestors(queue).any(|name| {
            self.queues
                .get(name)
                .and_then(|q| q.acls.get(&acl))
                .is_some_and(|users| users.iter().any(|u| u == WILDCARD_ACL || u == user))
        });
        if granted {
            return true;
        }
        // An unconfigured root ACL admits everyone.
        self.queues
            .get(ROOT_QUEUE)
            .and_then(|q| q.acls.get(&acl))
            .is_none()
    }
}

/// Iterate `queue` and each of its ancestors, nearest first:
/// `root.a.b`, `root.a`, `root`.
pub fn ancestors(queue: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(queue);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rfind('.').map(|idx| &current[..idx]);
        Some(current)
    })
}

/// Path of the parent queue, or `None` for a top-level name.
#[must_use]
pub fn parent_name(queue: &str) -> Option<&str> {
    queue.rfind('.').map(|idx| &queue[..idx])
}

fn validate_queue_name(name: &str) -> Result<(), String> {
    if name != ROOT_QUEUE && !name.starts_with("root.") {
        return Err(format!("queue `{name}` must be rooted at `{ROOT_QUEUE}`"));
    }
    if name.split('.').any(str::is_empty) {
        return Err(format!("queue `{name}` has an empty path segment"));
    }
    Ok(())
}
