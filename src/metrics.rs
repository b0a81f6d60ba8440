//! Session metrics derived from the simulation stream.
//!
//! Dashboards want more than the instantaneous numbers: ride time, virtual
//! distance, average/max power, short rolling averages and mechanical work.
//! The tracker is fed every engine tick and hands out immutable snapshots.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::sim::SimulationState;

/// Time-windowed mean over (timestamp, value) samples.
#[derive(Debug, Clone)]
struct TimedAverage {
    window_s: f64,
    samples: VecDeque<(f64, f64)>,
    sum: f64,
}

impl TimedAverage {
    fn new(window_s: f64) -> Self {
        Self {
            window_s,
            samples: VecDeque::new(),
            sum: 0.0,
        }
    }

    fn add(&mut self, t_s: f64, value: f64) {
        self.samples.push_back((t_s, value));
        self.sum += value;
        while let Some(&(oldest, v)) = self.samples.front() {
            if t_s - oldest > self.window_s {
                self.samples.pop_front();
                self.sum -= v;
            } else {
                break;
            }
        }
    }

    fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as f64)
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

/// Immutable metrics snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Ride time, seconds.
    pub elapsed_s: f64,
    /// Virtual distance covered, meters.
    pub distance_m: f64,
    /// Time-weighted average power, watts.
    pub avg_power_w: f64,
    /// Highest emitted power, watts.
    pub max_power_w: i32,
    /// 3-second rolling average power, watts.
    pub power_3s_w: Option<f64>,
    /// 30-second rolling average power, watts.
    pub power_30s_w: Option<f64>,
    /// Mechanical work, kilojoules.
    pub energy_kj: f64,
    /// Average cadence over the session, rpm.
    pub avg_cadence_rpm: f64,
}

/// Accumulates session metrics tick by tick.
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    elapsed_s: f64,
    distance_m: f64,
    work_j: f64,
    cadence_integral: f64,
    max_power_w: i32,
    power_3s: TimedAverage,
    power_30s: TimedAverage,
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsTracker {
    /// Fresh tracker with nothing accumulated.
    pub fn new() -> Self {
        Self {
            elapsed_s: 0.0,
            distance_m: 0.0,
            work_j: 0.0,
            cadence_integral: 0.0,
            max_power_w: 0,
            power_3s: TimedAverage::new(3.0),
            power_30s: TimedAverage::new(30.0),
        }
    }

    /// Fold one engine tick into the session.
    pub fn record(&mut self, state: &SimulationState, dt_s: f64) {
        if !(dt_s > 0.0) || !dt_s.is_finite() {
            return;
        }
        self.elapsed_s += dt_s;
        self.distance_m += state.speed_mps.max(0.0) * dt_s;
        self.work_j += state.power_w.max(0) as f64 * dt_s;
        self.cadence_integral += state.cadence_rpm.max(0) as f64 * dt_s;
        self.max_power_w = self.max_power_w.max(state.power_w);
        self.power_3s.add(self.elapsed_s, state.power_w as f64);
        self.power_30s.add(self.elapsed_s, state.power_w as f64);
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionMetrics {
        let elapsed = self.elapsed_s;
        SessionMetrics {
            elapsed_s: elapsed,
            distance_m: self.distance_m,
            avg_power_w: if elapsed > 0.0 { self.work_j / elapsed } else { 0.0 },
            max_power_w: self.max_power_w,
            power_3s_w: self.power_3s.average(),
            power_30s_w: self.power_30s.average(),
            energy_kj: self.work_j / 1000.0,
            avg_cadence_rpm: if elapsed > 0.0 {
                self.cadence_integral / elapsed
            } else {
                0.0
            },
        }
    }

    /// Drop everything for a new session.
    pub fn reset(&mut self) {
        self.elapsed_s = 0.0;
        self.distance_m = 0.0;
        self.work_j = 0.0;
        self.cadence_integral = 0.0;
        self.max_power_w = 0;
        self.power_3s.reset();
        self.power_30s.reset();
    }
}

/// Estimate burned calories from mechanical work.
///
/// Cycling convention: 1 kJ of work ≈ 1 kcal burned, the metabolic
/// inefficiency roughly cancelling the J→cal conversion.
pub fn estimate_calories(energy_kj: f64) -> u32 {
    energy_kj.max(0.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Gear;

    fn state(power: i32, speed: f64, cadence: i32) -> SimulationState {
        SimulationState {
            power_w: power,
            speed_mps: speed,
            cadence_rpm: cadence,
            fatigue: 0.0,
            noise_rpm: 0.0,
            gear: Gear { front: 50, rear: 17 },
            target_cadence_rpm: 90.0,
        }
    }

    #[test]
    fn test_steady_state_accumulation() {
        let mut tracker = MetricsTracker::new();
        // 200 W at 10 m/s for 60 s.
        for _ in 0..240 {
            tracker.record(&state(200, 10.0, 90), 0.25);
        }
        let snap = tracker.snapshot();
        assert!((snap.elapsed_s - 60.0).abs() < 1e-9);
        assert!((snap.distance_m - 600.0).abs() < 1e-6);
        assert!((snap.avg_power_w - 200.0).abs() < 1e-6);
        assert_eq!(snap.max_power_w, 200);
        assert!((snap.energy_kj - 12.0).abs() < 1e-6);
        assert!((snap.avg_cadence_rpm - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_windows_track_recent_power() {
        let mut tracker = MetricsTracker::new();
        for _ in 0..240 {
            tracker.record(&state(150, 9.0, 85), 0.25);
        }
        // A 10-second surge: the 3 s window follows, the session average lags.
        for _ in 0..40 {
            tracker.record(&state(400, 11.0, 95), 0.25);
        }
        let snap = tracker.snapshot();
        assert!((snap.power_3s_w.unwrap() - 400.0).abs() < 1.0);
        assert!(snap.avg_power_w < 200.0);
        assert!(snap.power_30s_w.unwrap() > snap.avg_power_w);
    }

    #[test]
    fn test_degenerate_dt_ignored() {
        let mut tracker = MetricsTracker::new();
        tracker.record(&state(200, 10.0, 90), 0.0);
        tracker.record(&state(200, 10.0, 90), f64::NAN);
        assert_eq!(tracker.snapshot().elapsed_s, 0.0);
    }

    #[test]
    fn test_reset_clears_session() {
        let mut tracker = MetricsTracker::new();
        for _ in 0..100 {
            tracker.record(&state(250, 9.5, 90), 0.25);
        }
        tracker.reset();
        let snap = tracker.snapshot();
        assert_eq!(snap.elapsed_s, 0.0);
        assert_eq!(snap.max_power_w, 0);
        assert!(snap.power_3s_w.is_none());
    }

    #[test]
    fn test_calorie_estimate() {
        // 200 W for an hour is 720 kJ, call it 720 kcal.
        assert_eq!(estimate_calories(720.0), 720);
    }
}
