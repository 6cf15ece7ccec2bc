//! The 1-Euro filter: a low-pass filter whose cutoff frequency adapts to the signal's estimated
//! speed, trading lag for jitter rejection only when the signal is (nearly) still.

use std::f32::consts::PI;

use super::lowpass::LowPassFilter;

fn alpha(cutoff: f32, frequency: f32) -> f32 {
    1.0 / (1.0 + (1.0 / (2.0 * PI * cutoff)) * frequency)
}

#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    derivate_cutoff: f32,
    frequency: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    last_timestamp_us: Option<i64>,
}

impl OneEuroFilter {
    pub fn new(frequency: f32, min_cutoff: f32, beta: f32, derivate_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            derivate_cutoff,
            frequency,
            x_filter: LowPassFilter::new(1.0),
            dx_filter: LowPassFilter::new(1.0),
            last_timestamp_us: None,
        }
    }

    pub fn apply(&mut self, timestamp_us: i64, value: f32) -> f32 {
        if let Some(last) = self.last_timestamp_us {
            if timestamp_us <= last {
                log::warn!("1-euro filter received a non-monotone timestamp; ignoring sample");
                return value;
            }
            let dt_us = timestamp_us - last;
            if dt_us > 0 {
                self.frequency = 1_000_000.0 / dt_us as f32;
            }
        }

        let dx = match self.x_filter.last_raw() {
            Some(prev_raw) => (value - prev_raw) * self.frequency,
            None => 0.0,
        };
        let edx = self.dx_filter.apply_with_alpha(dx, alpha(self.derivate_cutoff, self.frequency));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        let filtered = self.x_filter.apply_with_alpha(value, alpha(cutoff, self.frequency));

        self.last_timestamp_us = Some(timestamp_us);
        filtered
    }

    pub fn reset(&mut self) {
        self.x_filter.reset();
        self.dx_filter.reset();
        self.last_timestamp_us = None;
    }
}
