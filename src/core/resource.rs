//! Multi-dimensional resource quantities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known dimension: memory in megabytes.
pub const MEMORY_MB: &str = "memory-mb";
/// Well-known dimension: virtual cores.
pub const VCORES: &str = "vcores";

/// A non-negative quantity over named dimensions (memory, cores, GPUs, ...).
///
/// Dimensions that are absent are zero. Zero-valued dimensions are never
/// stored, so two vectors compare equal exactly when every dimension matches.
/// All operations are pure and return a new vector.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct ResourceVector {
    dims: BTreeMap<String, u64>,
}

impl ResourceVector {
    /// The zero vector.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            dims: BTreeMap::new(),
        }
    }

    /// Convenience constructor for the two common dimensions.
    #[must_use]
    pub fn new(memory_mb: u64, vcores: u64) -> Self {
        Self::zero()
            .with(MEMORY_MB, memory_mb)
            .with(VCORES, vcores)
    }

    /// Return a copy with `dim` set to `value`.
    #[must_use]
    pub fn with(mut self, dim: impl Into<String>, value: u64) -> Self {
        let dim = dim.into();
        if value == 0 {
            self.dims.remove(&dim);
        } else {
            self.dims.insert(dim, value);
        }
        self
    }

    /// Value of one dimension (zero when absent).
    #[must_use]
    pub fn get(&self, dim: &str) -> u64 {
        self.dims.get(dim).copied().unwrap_or(0)
    }

    /// Memory dimension.
    #[must_use]
    pub fn memory_mb(&self) -> u64 {
        self.get(MEMORY_MB)
    }

    /// Virtual-core dimension.
    #[must_use]
    pub fn vcores(&self) -> u64 {
        self.get(VCORES)
    }

    /// True if every dimension is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.dims.is_empty()
    }

    /// Iterate the non-zero dimensions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.dims.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Component-wise sum. Saturates at `u64::MAX`.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut dims = self.dims.clone();
        for (k, v) in &other.dims {
            let slot = dims.entry(k.clone()).or_insert(0);
            *slot = slot.saturating_add(*v);
        }
        Self { dims }
    }

    /// Component-wise difference, floored at zero.
    #[must_use]
    pub fn saturating_sub(&self, other: &Self) -> Self {
        let dims = self
            .dims
            .iter()
            .map(|(k, v)| (k.clone(), v.saturating_sub(other.get(k))))
            .filter(|(_, v)| *v > 0)
            .collect();
        Self { dims }
    }

    /// Component-wise minimum. A dimension absent from either side is zero.
    #[must_use]
    pub fn component_min(&self, other: &Self) -> Self {
        let dims = self
            .dims
            .iter()
            .filter_map(|(k, v)| {
                let m = (*v).min(other.get(k));
                (m > 0).then(|| (k.clone(), m))
            })
            .collect();
        Self { dims }
    }

    /// True if every dimension of `self` is at most the same dimension of
    /// `limit`.
    #[must_use]
    pub fn fits_in(&self, limit: &Self) -> bool {
        self.dims.iter().all(|(k, v)| *v <= limit.get(k))
    }

    /// Clamp to a configured cap. Only the dimensions `cap` names are
    /// limited; every other dimension passes through unchanged.
    #[must_use]
    pub fn clamp_to(&self, cap: &Self) -> Self {
        let dims = self
            .dims
            .iter()
            .map(|(k, v)| (k.clone(), cap.dims.get(k).map_or(*v, |c| (*v).min(*c))))
            .collect();
        Self { dims }
    }

    /// True if `self` stays within a configured cap on every dimension the
    /// cap names. Dimensions the cap leaves out are unbounded.
    #[must_use]
    pub fn fits_under(&self, cap: &Self) -> bool {
        self.dims
            .iter()
            .all(|(k, v)| cap.dims.get(k).is_none_or(|c| v <= c))
    }

    /// Multiply every dimension by `factor`, rounding down. Negative or
    /// non-finite factors yield zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scale(&self, factor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return Self::zero();
        }
        let dims = self
            .dims
            .iter()
            .map(|(k, v)| (k.clone(), (*v as f64 * factor).floor() as u64))
            .filter(|(_, v)| *v > 0)
            .collect();
        Self { dims }
    }
}

impl From<BTreeMap<String, u64>> for ResourceVector {
    fn from(mut dims: BTreeMap<String, u64>) -> Self {
        dims.retain(|_, v| *v > 0);
        Self { dims }
    }
}

impl From<ResourceVector> for BTreeMap<String, u64> {
    fn from(v: ResourceVector) -> Self {
        v.dims
    }
}

impl fmt::Debug for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        for (i, (k, v)) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}:{v}")?;
        }
        f.write_str(">")
    }
}
