//! Trainer-side power shaping.
//!
//! Takes the commanded wattage and produces what a real trainer would report:
//! torque pulsing with the pedal stroke, a small left/right imbalance, the
//! stochastic variation from the variance process, and a first-order lag that
//! models the trainer's flywheel and firmware smoothing. A sliding window
//! keeps a display-friendly average alongside the instantaneous value.

use std::collections::VecDeque;

/// Torque modulation amplitude across the pedal stroke.
const TORQUE_VARIATION: f64 = 0.20;
/// Default left/right power imbalance fraction.
const DEFAULT_IMBALANCE: f64 = 0.02;
/// Hard cap on the imbalance a caller may configure.
const MAX_IMBALANCE: f64 = 0.10;
/// Trainer response time constant, seconds.
const TAU_TRAINER_S: f64 = 3.0;
/// Default display smoothing window, milliseconds.
const DEFAULT_DISPLAY_WINDOW_MS: u64 = 3000;

/// First-order smoothed power source with pedal-stroke texture.
#[derive(Debug, Clone)]
pub struct PowerSmoother {
    pedal_angle_deg: f64,
    control_power_w: f64,
    imbalance: f64,
    display_window_ms: u64,
    /// (elapsed seconds, smoothed watts) samples inside the display window.
    display_buffer: VecDeque<(f64, f64)>,
    elapsed_s: f64,
}

impl Default for PowerSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_IMBALANCE, DEFAULT_DISPLAY_WINDOW_MS)
    }
}

impl PowerSmoother {
    /// Create a smoother with a given L/R imbalance and display window.
    pub fn new(imbalance: f64, display_window_ms: u64) -> Self {
        Self {
            pedal_angle_deg: 0.0,
            control_power_w: 0.0,
            imbalance: imbalance.clamp(-MAX_IMBALANCE, MAX_IMBALANCE),
            display_window_ms,
            display_buffer: VecDeque::new(),
            elapsed_s: 0.0,
        }
    }

    /// Advance one tick and return the emitted wattage.
    ///
    /// `variation` is the fractional offset from [`crate::sim::PowerVariance`].
    /// Resting immediately zeroes all internal state.
    pub fn update(
        &mut self,
        target_w: i32,
        cadence_rpm: f64,
        variation: f64,
        is_resting: bool,
        dt_s: f64,
    ) -> i32 {
        if is_resting {
            self.reset();
            return 0;
        }

        let target = (target_w as f64).clamp(0.0, 2500.0);
        let cadence = cadence_rpm.clamp(0.0, 200.0);
        self.elapsed_s += dt_s;

        // One crank revolution per 60/cadence seconds.
        self.pedal_angle_deg = (self.pedal_angle_deg + cadence * 360.0 * dt_s / 60.0) % 360.0;

        let torque = 1.0 + TORQUE_VARIATION * self.pedal_angle_deg.to_radians().sin();
        let side = if self.pedal_angle_deg < 180.0 {
            1.0 + self.imbalance
        } else {
            1.0 - self.imbalance
        };
        let instant = target * torque * side * (1.0 + variation);

        let alpha = 1.0 - (-dt_s / TAU_TRAINER_S).exp();
        self.control_power_w += alpha * (instant - self.control_power_w);

        self.push_display_sample(self.elapsed_s, self.control_power_w);

        (self.control_power_w.round() as i32).max(0)
    }

    /// Mean of the smoothed samples inside the display window.
    pub fn display_power(&self) -> f64 {
        if self.display_buffer.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.display_buffer.iter().map(|(_, v)| v).sum();
        sum / self.display_buffer.len() as f64
    }

    /// Zero the lag filter, pedal angle, and display buffer.
    pub fn reset(&mut self) {
        self.pedal_angle_deg = 0.0;
        self.control_power_w = 0.0;
        self.display_buffer.clear();
    }

    fn push_display_sample(&mut self, t_s: f64, watts: f64) {
        self.display_buffer.push_back((t_s, watts));
        let window_s = self.display_window_ms as f64 / 1000.0;
        while let Some(&(oldest, _)) = self.display_buffer.front() {
            if t_s - oldest > window_s {
                self.display_buffer.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resting_returns_zero_and_clears_state() {
        let mut s = PowerSmoother::default();
        for _ in 0..20 {
            s.update(250, 90.0, 0.0, false, 0.25);
        }
        assert_eq!(s.update(250, 90.0, 0.0, true, 0.25), 0);
        assert_eq!(s.display_power(), 0.0);
    }

    #[test]
    fn test_settles_near_target_with_zero_variation() {
        let mut s = PowerSmoother::new(0.0, 3000);
        let mut last = 0;
        // 60 s at 4 Hz is 20 trainer time constants.
        for _ in 0..240 {
            last = s.update(200, 90.0, 0.0, false, 0.25);
        }
        // Torque modulation keeps single samples off-target; the window mean
        // should sit close to the command.
        assert!((s.display_power() - 200.0).abs() < 15.0);
        assert!(last > 150 && last < 260, "settled sample was {}", last);
    }

    #[test]
    fn test_monotone_in_target_once_settled() {
        let settle = |target: i32| {
            let mut s = PowerSmoother::new(0.0, 3000);
            for _ in 0..400 {
                s.update(target, 90.0, 0.0, false, 0.25);
            }
            s.display_power()
        };
        let p150 = settle(150);
        let p250 = settle(250);
        let p350 = settle(350);
        assert!(p150 < p250 && p250 < p350);
    }

    #[test]
    fn test_output_never_negative() {
        let mut s = PowerSmoother::default();
        for _ in 0..100 {
            assert!(s.update(0, 90.0, -0.5, false, 0.25) >= 0);
        }
    }

    #[test]
    fn test_target_clamped_to_trainer_limit() {
        let mut s = PowerSmoother::new(0.0, 3000);
        let mut last = 0;
        for _ in 0..500 {
            last = s.update(10_000, 90.0, 0.0, false, 0.25);
        }
        // 2500 W cap plus at most 20% torque ripple.
        assert!(last <= 3000, "emitted {} W", last);
    }
}
