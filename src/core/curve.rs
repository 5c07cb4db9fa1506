//! Piecewise-Linear Curves
//!
//! Scalar-to-scalar mappings over configured control points. Used for
//! heat -> spread, heat -> heat-per-shot, heat -> cooldown rate and
//! distance -> damage falloff.
//!
//! Evaluation never extrapolates: inputs outside the domain clamp to the
//! value of the nearest end key.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// One control point of a curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Input value (x)
    pub time: f32,
    /// Output value (y)
    pub value: f32,
}

impl CurveKey {
    /// Create a new key.
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Errors for malformed curves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    /// Curve has no keys, so it has no domain.
    #[error("curve has no keys")]
    Empty,

    /// A key has a non-finite time or value.
    #[error("key {index} is not finite")]
    NonFinite {
        /// Offending key index
        index: usize,
    },

    /// Key times are not strictly increasing.
    #[error("key {index} does not come after the previous key")]
    Unsorted {
        /// Offending key index
        index: usize,
    },

    /// Curve values decrease somewhere.
    #[error("curve is not monotonic at key {index}")]
    NotMonotonic {
        /// Offending key index
        index: usize,
    },
}

/// Piecewise-linear curve with sorted keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    /// Curve with no data.
    pub const fn empty() -> Self {
        Self { keys: Vec::new() }
    }

    /// Build a curve from keys, validating ordering and finiteness.
    pub fn new(keys: Vec<CurveKey>) -> Result<Self, CurveError> {
        let curve = Self { keys };
        curve.validate()?;
        Ok(curve)
    }

    /// Build a curve from `(time, value)` pairs.
    pub fn from_points(points: &[(f32, f32)]) -> Result<Self, CurveError> {
        Self::new(points.iter().map(|&(t, v)| CurveKey::new(t, v)).collect())
    }

    /// Flat curve with a single key at time zero.
    pub fn constant(value: f32) -> Self {
        Self { keys: vec![CurveKey::new(0.0, value)] }
    }

    /// Control points in time order.
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Whether the curve has any keys.
    #[inline]
    pub fn has_data(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Check key ordering and finiteness. An empty curve is valid here;
    /// callers that need a domain check [`Curve::has_data`].
    pub fn validate(&self) -> Result<(), CurveError> {
        for (index, key) in self.keys.iter().enumerate() {
            if !key.time.is_finite() || !key.value.is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 && key.time <= self.keys[index - 1].time {
                return Err(CurveError::Unsorted { index });
            }
        }
        Ok(())
    }

    /// Check that values never decrease as time increases.
    pub fn validate_monotonic(&self) -> Result<(), CurveError> {
        for index in 1..self.keys.len() {
            if self.keys[index].value < self.keys[index - 1].value {
                return Err(CurveError::NotMonotonic { index });
            }
        }
        Ok(())
    }

    /// Evaluate at `x`, clamping outside the domain.
    ///
    /// An empty curve evaluates to 0.
    pub fn eval(&self, x: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        if x <= first.time {
            return first.value;
        }
        if x >= last.time {
            return last.value;
        }

        // First key strictly after x; always in 1..len here
        let upper = self.keys.partition_point(|k| k.time <= x);
        let a = &self.keys[upper - 1];
        let b = &self.keys[upper];
        let alpha = (x - a.time) / (b.time - a.time);
        a.value + (b.value - a.value) * alpha
    }

    /// Domain `(min_time, max_time)`, if the curve has keys.
    pub fn time_range(&self) -> Option<(f32, f32)> {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    /// Range `(min_value, max_value)`, if the curve has keys.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let mut iter = self.keys.iter();
        let first = iter.next()?;
        Some(iter.fold((first.value, first.value), |(lo, hi), k| {
            (lo.min(k.value), hi.max(k.value))
        }))
    }
}
