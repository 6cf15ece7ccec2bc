//! Exponential-moving-average low-pass filter, the primitive every other filter in this module
//! builds on.

/// `y = alpha*x + (1-alpha)*y_prev`. Stores the last raw and last filtered value so
/// [`RelativeVelocityFilter`](super::velocity::RelativeVelocityFilter) and
/// [`OneEuroFilter`](super::one_euro::OneEuroFilter) can drive it with a per-call alpha instead
/// of a fixed one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPassFilter {
    alpha: f32,
    raw: Option<f32>,
    filtered: Option<f32>,
}

impl LowPassFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, raw: None, filtered: None }
    }

    /// Applies the filter using its own configured alpha.
    pub fn apply(&mut self, value: f32) -> f32 {
        self.apply_with_alpha(value, self.alpha)
    }

    /// Applies the filter with an alpha overriding the one passed to [`Self::new`].
    pub fn apply_with_alpha(&mut self, value: f32, alpha: f32) -> f32 {
        let filtered = match self.filtered {
            None => value,
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
        };
        self.raw = Some(value);
        self.filtered = Some(filtered);
        filtered
    }

    pub fn reset(&mut self) {
        self.raw = None;
        self.filtered = None;
    }

    pub fn last_raw(&self) -> Option<f32> {
        self.raw
    }

    pub fn last_filtered(&self) -> Option<f32> {
        self.filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through_unchanged() {
        let mut f = LowPassFilter::new(0.1);
        assert_eq!(f.apply(5.0), 5.0);
    }

    #[test]
    fn converges_toward_a_constant_input() {
        let mut f = LowPassFilter::new(0.5);
        f.apply(0.0);
        for _ in 0..20 {
            f.apply(10.0);
        }
        assert!((f.last_filtered().unwrap() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn reset_clears_state() {
        let mut f = LowPassFilter::new(0.5);
        f.apply(1.0);
        f.apply(2.0);
        f.reset();
        assert_eq!(f.last_raw(), None);
        assert_eq!(f.apply(7.0), 7.0);
    }
}
