//! Scheduling priority.
//!
//! A [`Depth`] is an `f64` that is guaranteed finite, which lets it implement
//! [`Ord`]. Higher depth runs earlier; see the depth index for tie-breaking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// A finite scheduling priority.
///
/// Construction goes through [`Depth::new`], which rejects NaN and the
/// infinities. Negative zero is folded into positive zero so that `Eq` and
/// `Ord` agree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Depth(f64);

impl Depth {
    /// Depth `0.0`, the default for new entities.
    pub const ZERO: Depth = Depth(0.0);

    /// Validate and wrap a raw priority.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidValue`] if `value` is not finite.
    pub fn new(value: f64) -> Result<Self, EntityError> {
        if !value.is_finite() {
            return Err(EntityError::InvalidValue(value));
        }
        // -0.0 + 0.0 == +0.0
        Ok(Self(value + 0.0))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Depth {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Depth {}

impl PartialOrd for Depth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Depth {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for Depth {
    type Error = EntityError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Depth> for f64 {
    fn from(depth: Depth) -> Self {
        depth.0
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
