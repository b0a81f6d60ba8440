//! Stochastic power variation process.
//!
//! Real riders never hold a target wattage exactly. The model layers two
//! mean-reverting Ornstein–Uhlenbeck filters (fast "micro" jitter and a slow
//! "macro" drift) with a sparse Poisson event process (surges, shifts in
//! position) and returns a bounded fractional variation to apply on top of
//! the commanded power.

use crate::sim::rng::SeededRng;

/// Time constant of the fast jitter filter, seconds.
const TAU_MICRO_S: f64 = 0.167;
/// Time constant of the slow drift filter, seconds.
const TAU_MACRO_S: f64 = 3.33;

/// Allocation of the total coefficient of variation across components.
const WEIGHT_MICRO: f64 = 0.50;
const WEIGHT_MACRO: f64 = 0.35;
const WEIGHT_EVENT: f64 = 0.15;

/// Event duration bounds, seconds.
const EVENT_MIN_S: f64 = 0.5;
const EVENT_MAX_S: f64 = 2.0;

/// Fallback tick length when the caller hands us a degenerate dt.
const DEFAULT_DT_S: f64 = 0.25;

/// Bounded fractional power variation source.
#[derive(Debug, Clone)]
pub struct PowerVariance {
    x_micro: f64,
    x_macro: f64,
    event_active: bool,
    event_timer_s: f64,
    event_value: f64,
    rng: SeededRng,
}

impl PowerVariance {
    /// Create a variance process seeded for reproducibility.
    pub fn new(seed: u64) -> Self {
        Self {
            x_micro: 0.0,
            x_macro: 0.0,
            event_active: false,
            event_timer_s: 0.0,
            event_value: 0.0,
            rng: SeededRng::new(seed),
        }
    }

    /// Advance one tick and return the fractional variation.
    ///
    /// `randomness` is the 0–100 consumer dial; the total coefficient of
    /// variation is `randomness / 1000` (so 50 → 5% CV). `target_power_w`
    /// bounds the excursion so low targets are not swamped by noise.
    pub fn update(&mut self, randomness: i32, target_power_w: i32, dt_s: f64) -> f64 {
        let dt = if dt_s > 0.0 && dt_s <= 10.0 {
            dt_s
        } else {
            DEFAULT_DT_S
        };

        let randomness = randomness.clamp(0, 100);
        let cv_total = randomness as f64 / 1000.0;
        let cv_micro = cv_total * WEIGHT_MICRO.sqrt();
        let cv_macro = cv_total * WEIGHT_MACRO.sqrt();
        let cv_event = cv_total * WEIGHT_EVENT.sqrt();

        self.x_micro = ou_step(self.x_micro, cv_micro, TAU_MICRO_S, dt, &mut self.rng);
        self.x_macro = ou_step(self.x_macro, cv_macro, TAU_MACRO_S, dt, &mut self.rng);
        self.advance_event(randomness, target_power_w, cv_event, dt);

        let mut total = self.x_micro + self.x_macro;
        if self.event_active {
            total += self.event_value;
        }

        let power = target_power_w.max(120) as f64;
        let neg_limit = (60.0 / power).min(0.20);
        let pos_limit = (80.0 / power).min(0.20);
        total.clamp(-neg_limit, pos_limit)
    }

    /// Zero all filter state. The RNG stream is left untouched.
    pub fn reset(&mut self) {
        self.x_micro = 0.0;
        self.x_macro = 0.0;
        self.event_active = false;
        self.event_timer_s = 0.0;
        self.event_value = 0.0;
    }

    fn advance_event(&mut self, randomness: i32, target_power_w: i32, cv_event: f64, dt: f64) {
        if self.event_active {
            self.event_timer_s -= dt;
            if self.event_timer_s <= 0.0 {
                self.event_active = false;
                self.event_value = 0.0;
            }
            return;
        }

        // Poisson arrival: 0.2/min at the calm end, 2.0/min flat out.
        let rate_per_s = (0.2 + 1.8 * randomness as f64 / 100.0) / 60.0;
        let p_fire = 1.0 - (-rate_per_s * dt).exp();
        if self.rng.next_uniform() < p_fire {
            let magnitude_cap = (25.0 / target_power_w.max(100) as f64).min(0.10);
            let magnitude = self.rng.gaussian() * 2.0 * cv_event;
            self.event_active = true;
            self.event_timer_s =
                EVENT_MIN_S + (EVENT_MAX_S - EVENT_MIN_S) * self.rng.next_uniform();
            self.event_value = magnitude.clamp(-magnitude_cap, magnitude_cap);
        }
    }
}

/// One dt-correct step of a stationary OU process with standard deviation
/// `sigma` and time constant `tau`.
fn ou_step(x: f64, sigma: f64, tau: f64, dt: f64, rng: &mut SeededRng) -> f64 {
    let alpha = (-dt / tau).exp();
    x * alpha + sigma * (1.0 - alpha * alpha).sqrt() * rng.gaussian()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_randomness_is_silent() {
        let mut v = PowerVariance::new(1);
        for _ in 0..200 {
            assert_eq!(v.update(0, 250, 0.25), 0.0);
        }
    }

    #[test]
    fn test_variation_stays_within_power_scaled_bounds() {
        let mut v = PowerVariance::new(99);
        for _ in 0..5_000 {
            let frac = v.update(100, 150, 0.25);
            assert!(frac >= -(60.0 / 150.0f64).min(0.20) - 1e-12);
            assert!(frac <= (80.0 / 150.0f64).min(0.20) + 1e-12);
        }
    }

    #[test]
    fn test_sample_mean_near_zero_with_positive_lag1_autocorrelation() {
        let mut v = PowerVariance::new(2024);
        let samples: Vec<f64> = (0..4_000).map(|_| v.update(50, 250, 0.25)).collect();

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        assert!(mean.abs() < 0.05, "mean was {}", mean);

        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let cov: f64 = samples
            .windows(2)
            .map(|w| (w[0] - mean) * (w[1] - mean))
            .sum::<f64>()
            / (n - 1.0);
        let rho1 = cov / var;
        assert!(rho1 > 0.0 && rho1 < 0.95, "lag-1 autocorrelation was {}", rho1);
    }

    #[test]
    fn test_degenerate_dt_uses_default() {
        let mut a = PowerVariance::new(5);
        let mut b = PowerVariance::new(5);
        // dt of 0 and a wild 60 s both fall back to 0.25 s.
        assert_eq!(a.update(50, 250, 0.0), b.update(50, 250, 0.25));
        assert_eq!(a.update(50, 250, 60.0), b.update(50, 250, 0.25));
    }

    #[test]
    fn test_reset_clears_filters() {
        let mut v = PowerVariance::new(3);
        for _ in 0..50 {
            v.update(80, 250, 0.25);
        }
        v.reset();
        assert!(!v.event_active);
        assert_eq!(v.x_micro, 0.0);
        assert_eq!(v.x_macro, 0.0);
    }
}
