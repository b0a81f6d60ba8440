//! Per-tick simulation pipeline.
//!
//! Composes the variance process, trainer power smoother, speed solver and
//! cadence model into a single `update` entry point. The engine is
//! deterministic for a given seed and sequence of (input, dt) pairs;
//! [`SimulationEngine::update`] reads the monotonic clock, while
//! [`SimulationEngine::step`] takes an explicit dt for replay and tests.

use std::time::Instant;

use crate::sim::cadence::{CadenceModel, Gear, Gearset};
use crate::sim::power::PowerSmoother;
use crate::sim::speed::{calculate_speed, RiderParams};
use crate::sim::variance::PowerVariance;

/// Minimum tick length, seconds.
const MIN_DT_S: f64 = 0.001;

/// Everything the engine needs for one tick. Immutable per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInput {
    /// Commanded power, watts.
    pub target_power_w: i32,
    /// Rider-forced cadence; `None` lets the model choose.
    pub manual_cadence_rpm: Option<i32>,
    /// Simulated road grade, percent.
    pub grade_pct: f64,
    /// Noise dial, 0 (metronome) to 100 (ragged group ride).
    pub randomness: i32,
    /// True while the rider is soft-pedalling between efforts.
    pub is_resting: bool,
}

impl Default for SimulationInput {
    fn default() -> Self {
        Self {
            target_power_w: 250,
            manual_cadence_rpm: None,
            grade_pct: 0.0,
            randomness: 50,
            is_resting: false,
        }
    }
}

/// Output of one simulation tick.
#[derive(Debug, Clone, Copy)]
pub struct SimulationState {
    /// Emitted power, watts.
    pub power_w: i32,
    /// Speed over simulated ground, m/s.
    pub speed_mps: f64,
    /// Emitted cadence, rpm.
    pub cadence_rpm: i32,
    /// Fatigue level in [0, 1].
    pub fatigue: f64,
    /// Current cadence jitter, rpm.
    pub noise_rpm: f64,
    /// Selected gear.
    pub gear: Gear,
    /// Cadence the model is steering toward, rpm.
    pub target_cadence_rpm: f64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            power_w: 0,
            speed_mps: 0.0,
            cadence_rpm: 0,
            fatigue: 0.0,
            noise_rpm: 0.0,
            gear: Gear { front: 50, rear: 18 },
            target_cadence_rpm: 85.0,
        }
    }
}

/// The composed simulation pipeline.
pub struct SimulationEngine {
    variance: PowerVariance,
    smoother: PowerSmoother,
    cadence: CadenceModel,
    rider: RiderParams,
    last_cadence_rpm: f64,
    last_tick: Option<Instant>,
    last_state: SimulationState,
    seed: u64,
}

impl SimulationEngine {
    /// Build an engine for the given rider and drivetrain.
    ///
    /// The seed fans out to independent RNG streams for the variance
    /// process and the cadence model.
    pub fn new(rider: RiderParams, gearset: Gearset, seed: u64) -> Self {
        Self {
            variance: PowerVariance::new(seed),
            smoother: PowerSmoother::default(),
            cadence: CadenceModel::new(gearset, rider.ftp_w, seed.wrapping_mul(0x9E37_79B9)),
            rider,
            last_cadence_rpm: 85.0,
            last_tick: None,
            last_state: SimulationState::default(),
            seed,
        }
    }

    /// Engine with default rider, gearset and seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(RiderParams::default(), Gearset::default(), seed)
    }

    /// Run one tick against the monotonic clock.
    pub fn update(&mut self, input: &SimulationInput) -> SimulationState {
        let now = Instant::now();
        let dt = match self.last_tick {
            Some(prev) => now.duration_since(prev).as_secs_f64().max(MIN_DT_S),
            None => MIN_DT_S,
        };
        self.last_tick = Some(now);
        self.step(input, dt)
    }

    /// Run one tick with an explicit dt.
    pub fn step(&mut self, input: &SimulationInput, dt_s: f64) -> SimulationState {
        let dt = if dt_s.is_finite() { dt_s.max(MIN_DT_S) } else { MIN_DT_S };

        let variation = self
            .variance
            .update(input.randomness, input.target_power_w, dt);

        let power_w = self.smoother.update(
            input.target_power_w,
            self.last_cadence_rpm,
            variation,
            input.is_resting,
            dt,
        );

        let speed_mps = calculate_speed(power_w as f64, input.grade_pct, &self.rider);

        // The model always advances so gear tracking stays live, even when a
        // manual cadence overrides the output.
        let modeled = self
            .cadence
            .update(power_w as f64, input.grade_pct, speed_mps, dt);
        let cadence_rpm = match input.manual_cadence_rpm {
            Some(manual) => manual.clamp(0, 180),
            None => modeled.round() as i32,
        };
        self.last_cadence_rpm = cadence_rpm as f64;

        let state = SimulationState {
            power_w,
            speed_mps,
            cadence_rpm,
            fatigue: self.cadence.fatigue(),
            noise_rpm: self.cadence.noise(),
            gear: self.cadence.gear(),
            target_cadence_rpm: self.cadence.last_target(),
        };
        self.last_state = state;
        state
    }

    /// Most recent tick output without advancing the simulation.
    pub fn last_state(&self) -> SimulationState {
        self.last_state
    }

    /// Rider parameters in effect.
    pub fn rider(&self) -> &RiderParams {
        &self.rider
    }

    /// Display-window smoothed power, watts.
    pub fn display_power(&self) -> f64 {
        self.smoother.display_power()
    }

    /// Return to construction state, reusing the original seed.
    pub fn reset(&mut self) {
        let rider = self.rider;
        *self = Self::new(rider, Gearset::default(), self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_invariants_hold_over_varied_terrain() {
        let mut engine = SimulationEngine::with_seed(11);
        let gearset = Gearset::default();
        for i in 0..2_000 {
            let input = SimulationInput {
                target_power_w: 150 + (i % 5) * 50,
                grade_pct: ((i / 200) % 13) as f64 - 6.0,
                randomness: 60,
                ..Default::default()
            };
            let s = engine.step(&input, 0.25);
            assert!((0..=2500).contains(&s.power_w));
            assert!((0.0..=35.0).contains(&s.speed_mps));
            assert!((0..=180).contains(&s.cadence_rpm));
            assert!((0.0..=1.0).contains(&s.fatigue));
            assert!(gearset.chainrings.contains(&s.gear.front));
            assert!(gearset.cassette.contains(&s.gear.rear));
        }
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let input = SimulationInput::default();
        let mut a = SimulationEngine::with_seed(99);
        let mut b = SimulationEngine::with_seed(99);
        for _ in 0..200 {
            let sa = a.step(&input, 0.25);
            let sb = b.step(&input, 0.25);
            assert_eq!(sa.power_w, sb.power_w);
            assert_eq!(sa.cadence_rpm, sb.cadence_rpm);
            assert_eq!(sa.gear, sb.gear);
        }
    }

    #[test]
    fn test_auto_cadence_on_flat_settles_in_band() {
        let mut engine = SimulationEngine::with_seed(3);
        let input = SimulationInput {
            randomness: 0,
            ..Default::default()
        };
        let mut state = engine.step(&input, 0.1);
        for _ in 0..29 {
            state = engine.step(&input, 0.1);
        }
        assert!(
            (82.0..=98.0).contains(&state.target_cadence_rpm),
            "target cadence was {}",
            state.target_cadence_rpm
        );
    }

    #[test]
    fn test_manual_cadence_overrides_output() {
        let mut engine = SimulationEngine::with_seed(5);
        let input = SimulationInput {
            manual_cadence_rpm: Some(64),
            ..Default::default()
        };
        for _ in 0..10 {
            assert_eq!(engine.step(&input, 0.25).cadence_rpm, 64);
        }
    }

    #[test]
    fn test_resting_zeroes_power() {
        let mut engine = SimulationEngine::with_seed(8);
        let input = SimulationInput {
            is_resting: true,
            ..Default::default()
        };
        let s = engine.step(&input, 0.25);
        assert_eq!(s.power_w, 0);
    }

    #[test]
    fn test_grade_slows_the_rider() {
        let mut flat_engine = SimulationEngine::with_seed(21);
        let mut climb_engine = SimulationEngine::with_seed(21);
        let flat = SimulationInput {
            randomness: 0,
            ..Default::default()
        };
        let climb = SimulationInput {
            randomness: 0,
            grade_pct: 5.0,
            ..Default::default()
        };
        let mut v_flat = 0.0;
        let mut v_climb = 0.0;
        for _ in 0..120 {
            v_flat = flat_engine.step(&flat, 0.25).speed_mps;
            v_climb = climb_engine.step(&climb, 0.25).speed_mps;
        }
        assert!(v_climb < v_flat);
    }
}
