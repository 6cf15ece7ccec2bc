//! Numeric helpers.

use std::cmp::Ordering;

/// The logistic sigmoid function, `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// An `f32` wrapper that implements a total order, panicking on `NaN`.
///
/// Useful as a sort/max key for scores and confidences, which are never `NaN` in valid model
/// output but aren't `Ord` by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalF32(pub f32);

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or_else(|| panic!("`TotalF32` comparison encountered NaN"))
    }
}

/// Clamps `value` to the inclusive range `[min, max]`.
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(100.0) > 0.999);
        assert!(sigmoid(-100.0) < 0.001);
    }

    #[test]
    fn total_f32_orders_like_f32() {
        let mut values = [TotalF32(3.0), TotalF32(-1.0), TotalF32(2.0)];
        values.sort();
        assert_eq!(values, [TotalF32(-1.0), TotalF32(2.0), TotalF32(3.0)]);

        let max = values.into_iter().max_by_key(|v| *v).unwrap();
        assert_eq!(max, TotalF32(3.0));
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(0.5, 0.0, 1.0), 0.5);
    }
}
