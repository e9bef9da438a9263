//! Radial falloff curves used to shape brush fields.
//!
//! A curve maps a normalised distance-from-edge `t` (1 at the brush centre,
//! 0 at its rim) to a weight. Curves are user-authored and need not be
//! monotonic. Outside the key range the curve holds its first/last value, so
//! samples beyond the rim (negative `t`) take the value of the first key.

use serde::{Deserialize, Serialize};

/// Number of keys used when sampling the built-in smooth curve.
const SMOOTH_CURVE_KEYS: usize = 17;

/// One key of a falloff curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

impl CurveKey {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear falloff curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FalloffCurve {
    keys: Vec<CurveKey>,
}

impl Default for FalloffCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl FalloffCurve {
    /// Build a curve from arbitrary keys. Keys are sorted by time.
    pub fn from_keys(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Identity ramp: weight equals distance-from-rim.
    pub fn linear() -> Self {
        Self::from_keys(vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 1.0)])
    }

    /// Flat curve. Produces a hard-edged square or disc once combined with
    /// the rim clamp.
    pub fn constant(value: f32) -> Self {
        Self::from_keys(vec![CurveKey::new(0.0, value), CurveKey::new(1.0, value)])
    }

    /// Smoothstep ramp, sampled into linear segments.
    pub fn smooth() -> Self {
        let keys = (0..SMOOTH_CURVE_KEYS)
            .map(|i| {
                let t = i as f32 / (SMOOTH_CURVE_KEYS - 1) as f32;
                CurveKey::new(t, t * t * (3.0 - 2.0 * t))
            })
            .collect();
        Self::from_keys(keys)
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            // An empty curve behaves as full weight everywhere.
            _ => return 1.0,
        };

        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; guaranteed to exist and be > 0 here.
        let upper = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let f = (t - a.time) / span;
        a.value + (b.value - a.value) * f
    }
}
