//! Relative-velocity filter: an adaptive low-pass whose smoothing factor tightens or loosens
//! with how fast the signal is moving, scaled by an external "object scale" (e.g. the average of
//! an ROI's width/height) so a fast-moving close-up object isn't smoothed more than a
//! slow-moving distant one.

use std::collections::VecDeque;

use super::lowpass::LowPassFilter;

#[derive(Debug, Clone, Copy)]
struct WindowElement {
    distance: f32,
    duration_us: i64,
}

#[derive(Debug, Clone)]
pub struct RelativeVelocityFilter {
    window_size: usize,
    velocity_scale: f32,
    disable_value_scaling: bool,
    min_allowed_object_scale: f32,
    window: VecDeque<WindowElement>,
    value_filter: LowPassFilter,
    last_value: Option<f32>,
    last_timestamp_us: Option<i64>,
}

impl RelativeVelocityFilter {
    pub fn new(window_size: usize, velocity_scale: f32) -> Self {
        Self {
            window_size,
            velocity_scale,
            disable_value_scaling: false,
            min_allowed_object_scale: 1e-6,
            window: VecDeque::with_capacity(window_size),
            value_filter: LowPassFilter::new(1.0),
            last_value: None,
            last_timestamp_us: None,
        }
    }

    pub fn set_disable_value_scaling(&mut self, disable: bool) {
        self.disable_value_scaling = disable;
    }

    pub fn set_min_allowed_object_scale(&mut self, min: f32) {
        self.min_allowed_object_scale = min;
    }

    /// Filters `value`, sampled at `timestamp_us` from an object whose current scale is
    /// `object_scale` (only consulted when value scaling is enabled).
    pub fn apply(&mut self, timestamp_us: i64, value: f32, object_scale: f32) -> f32 {
        if !self.disable_value_scaling && object_scale < self.min_allowed_object_scale {
            return value;
        }

        let (Some(last_ts), Some(last_value)) = (self.last_timestamp_us, self.last_value) else {
            self.last_value = Some(value);
            self.last_timestamp_us = Some(timestamp_us);
            self.value_filter.reset();
            return self.value_filter.apply_with_alpha(value, 1.0);
        };

        if timestamp_us <= last_ts {
            log::warn!("relative-velocity filter received a non-monotone timestamp; ignoring sample");
            return value;
        }

        let value_scale = if self.disable_value_scaling { 1.0 } else { 1.0 / object_scale };
        let distance = (value - last_value) * value_scale;
        let duration_us = timestamp_us - last_ts;

        self.window.push_back(WindowElement { distance, duration_us });
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }

        // Weighted average instantaneous velocity across the window, recency-weighted (rank 0 =
        // most recent sample gets the largest weight).
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (rank, el) in self.window.iter().rev().enumerate() {
            let weight = 1.0 / (rank as f32 + 1.0);
            let instantaneous_velocity = el.distance / el.duration_us.max(1) as f32;
            weighted_sum += instantaneous_velocity * weight;
            weight_total += weight;
        }
        let velocity = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };

        let alpha = 1.0 - 1.0 / (1.0 + self.velocity_scale * velocity.abs());
        let filtered = self.value_filter.apply_with_alpha(value, alpha);

        self.last_value = Some(value);
        self.last_timestamp_us = Some(timestamp_us);
        filtered
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.value_filter.reset();
        self.last_value = None;
        self.last_timestamp_us = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut f = RelativeVelocityFilter::new(5, 10.0);
        assert_eq!(f.apply(0, 3.0, 1.0), 3.0);
    }

    #[test]
    fn below_min_object_scale_bypasses_smoothing_and_state() {
        let mut f = RelativeVelocityFilter::new(5, 10.0);
        f.set_min_allowed_object_scale(0.5);
        f.apply(0, 1.0, 1.0);
        let out = f.apply(1000, 100.0, 0.1);
        assert_eq!(out, 100.0);
        // state untouched: a subsequent in-range call still measures velocity from the sample
        // before the bypassed one.
        assert_eq!(f.last_value, Some(1.0));
    }

    #[test]
    fn rejects_non_monotone_timestamp() {
        let mut f = RelativeVelocityFilter::new(5, 10.0);
        f.apply(1000, 1.0, 1.0);
        let out = f.apply(1000, 5.0, 1.0);
        assert_eq!(out, 5.0);
    }

    #[test]
    fn large_velocity_reduces_smoothing_toward_raw_value() {
        let mut f = RelativeVelocityFilter::new(5, 100.0);
        f.apply(0, 0.0, 1.0);
        let out = f.apply(1000, 1000.0, 1.0);
        // A huge jump should drive alpha toward 1, so the filtered value tracks closely (not
        // exactly, since the lowpass stage still blends in one step of lag).
        assert!(out > 900.0);
    }
}
