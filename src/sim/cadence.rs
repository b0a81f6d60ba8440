//! Cadence, gearing and fatigue model.
//!
//! Produces a plausible pedalling cadence from power, grade and speed: a
//! logistic power→cadence preference, grade penalties, gear-ratio physics
//! with probabilistic shifting under cooldowns, a first-order response, an
//! OU jitter term, and a bounded W'-style fatigue integrator that slowly
//! drags cadence down when riding above threshold.

use crate::sim::rng::SeededRng;

/// Preferred cadence at very low power, rpm.
const CADENCE_LOW_RPM: f64 = 75.0;
/// Preferred cadence at very high power, rpm.
const CADENCE_HIGH_RPM: f64 = 95.0;
/// Power at the logistic midpoint, watts.
const CADENCE_P50_W: f64 = 250.0;
/// Logistic slope divisor, watts.
const CADENCE_K_W: f64 = 75.0;

/// Largest cadence penalty on a climb, rpm.
const MAX_UPHILL_DROP_RPM: f64 = 14.0;
/// Grade scale of the climb penalty, percent.
const UPHILL_GRADE_SCALE: f64 = 6.0;
/// Largest cadence bump on a descent, rpm.
const MAX_DOWNHILL_BUMP_RPM: f64 = 6.0;
/// Largest fatigue-induced cadence drop, rpm.
const MAX_FATIGUE_DROP_RPM: f64 = 5.0;

/// Baseline shift rate, per second.
const SHIFT_BASE_RATE: f64 = 1.0 / 60.0;
/// Cadence error (rpm) that doubles the baseline shift urge.
const SHIFT_ERROR_SCALE_RPM: f64 = 20.0;
/// Extra shift rate on steep terrain, per second.
const SHIFT_STEEP_RATE: f64 = 1.0 / 60.0;
/// Minimum time between rear shifts, seconds.
const REAR_SHIFT_COOLDOWN_S: f64 = 2.0;
/// Minimum time between front shifts, seconds.
const FRONT_SHIFT_COOLDOWN_S: f64 = 4.0;
/// Cadence transient when the front derailleur moves, rpm.
const FRONT_SHIFT_TRANSIENT_RPM: f64 = 8.0;

/// Cadence first-order response time constant, seconds.
const RESPONSE_TAU_S: f64 = 0.8;

/// Fallback cadence when the model goes non-finite, rpm.
const FALLBACK_CADENCE_RPM: f64 = 85.0;

/// A chainring/cog pairing, in teeth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gear {
    /// Chainring teeth.
    pub front: u32,
    /// Cassette cog teeth.
    pub rear: u32,
}

impl std::fmt::Display for Gear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.front, self.rear)
    }
}

/// The physical drivetrain the virtual rider shifts across.
#[derive(Debug, Clone)]
pub struct Gearset {
    /// Chainrings, big to small, teeth.
    pub chainrings: Vec<u32>,
    /// Cassette cogs, small to large, teeth.
    pub cassette: Vec<u32>,
    /// Driven wheel circumference, meters.
    pub wheel_circumference_m: f64,
}

impl Default for Gearset {
    fn default() -> Self {
        Self {
            chainrings: vec![50, 34],
            cassette: vec![11, 12, 13, 14, 16, 18, 20, 22, 25, 28, 32],
            wheel_circumference_m: 2.112,
        }
    }
}

impl Gearset {
    /// Cadence implied by riding `speed_mps` in the given gear.
    ///
    /// Returns 0 below 0.5 m/s (track-stand territory), otherwise
    /// `(60·v/C)·(R/F)` clamped to [0, 180].
    pub fn cadence_from_gear(&self, speed_mps: f64, gear: Gear) -> f64 {
        if speed_mps < 0.5 {
            return 0.0;
        }
        let wheel_rpm = 60.0 * speed_mps / self.wheel_circumference_m;
        (wheel_rpm * gear.rear as f64 / gear.front as f64).clamp(0.0, 180.0)
    }
}

/// Cadence state machine. One instance per simulated rider.
#[derive(Debug, Clone)]
pub struct CadenceModel {
    gearset: Gearset,
    cadence_rpm: f64,
    front_idx: usize,
    rear_idx: usize,
    fatigue: f64,
    noise_rpm: f64,
    last_target_rpm: f64,
    last_front_shift_s: f64,
    last_rear_shift_s: f64,
    elapsed_s: f64,
    ftp_w: f64,
    rng: SeededRng,
}

impl CadenceModel {
    /// Create a model over the given gearset, starting mid-cassette.
    pub fn new(gearset: Gearset, ftp_w: f64, seed: u64) -> Self {
        let rear_idx = gearset.cassette.len() / 2;
        Self {
            gearset,
            cadence_rpm: FALLBACK_CADENCE_RPM,
            front_idx: 0,
            rear_idx,
            fatigue: 0.0,
            noise_rpm: 0.0,
            last_target_rpm: FALLBACK_CADENCE_RPM,
            last_front_shift_s: f64::NEG_INFINITY,
            last_rear_shift_s: f64::NEG_INFINITY,
            elapsed_s: 0.0,
            ftp_w,
            rng: SeededRng::new(seed),
        }
    }

    /// Advance one tick and return the emitted cadence in rpm.
    pub fn update(&mut self, power_w: f64, grade_pct: f64, speed_mps: f64, dt_s: f64) -> f64 {
        let dt = if dt_s > 0.0 && dt_s.is_finite() {
            dt_s
        } else {
            0.25
        };
        self.elapsed_s += dt;

        let target = self.target_cadence(power_w, grade_pct);
        self.last_target_rpm = target;

        self.maybe_shift(target, grade_pct, speed_mps, dt);

        let gear_cadence = self.gear_cadence_with_limits(power_w, grade_pct, speed_mps);

        let alpha = 1.0 - (-dt / RESPONSE_TAU_S).exp();
        self.cadence_rpm += alpha * (gear_cadence - self.cadence_rpm);

        self.noise_rpm = (self.noise_rpm * (-2.0 * dt).exp()
            + 0.6 * (1.0 - (-4.0 * dt).exp()).sqrt() * self.rng.gaussian())
        .clamp(-2.0, 2.0);

        self.update_fatigue(power_w, dt);

        let emitted = (self.cadence_rpm + self.noise_rpm).clamp(0.0, 180.0);
        if emitted.is_finite() {
            emitted
        } else {
            self.cadence_rpm = FALLBACK_CADENCE_RPM;
            FALLBACK_CADENCE_RPM
        }
    }

    /// Preferred cadence before gearing constraints, bounded to [40, 120].
    pub fn target_cadence(&self, power_w: f64, grade_pct: f64) -> f64 {
        let logistic = CADENCE_LOW_RPM
            + (CADENCE_HIGH_RPM - CADENCE_LOW_RPM)
                / (1.0 + (-(power_w - CADENCE_P50_W) / CADENCE_K_W).exp());

        let uphill_drop = if grade_pct > 0.0 {
            MAX_UPHILL_DROP_RPM * (1.0 - (-grade_pct / UPHILL_GRADE_SCALE).exp())
        } else {
            0.0
        };
        let downhill_bump = if grade_pct < -3.0 {
            MAX_DOWNHILL_BUMP_RPM * (1.0 - (-(grade_pct.abs() - 3.0) / 3.0).exp())
        } else {
            0.0
        };
        let fatigue_drop = (5.0 * self.fatigue).min(MAX_FATIGUE_DROP_RPM);

        (logistic - uphill_drop + downhill_bump - fatigue_drop).clamp(40.0, 120.0)
    }

    /// Current gear as (chainring, cog) teeth.
    pub fn gear(&self) -> Gear {
        Gear {
            front: self.gearset.chainrings[self.front_idx],
            rear: self.gearset.cassette[self.rear_idx],
        }
    }

    /// Smoothed cadence without jitter, rpm.
    pub fn cadence(&self) -> f64 {
        self.cadence_rpm
    }

    /// Accumulated fatigue in [0, 1].
    pub fn fatigue(&self) -> f64 {
        self.fatigue
    }

    /// Current jitter sample, rpm.
    pub fn noise(&self) -> f64 {
        self.noise_rpm
    }

    /// Most recent target cadence, rpm.
    pub fn last_target(&self) -> f64 {
        self.last_target_rpm
    }

    /// Restore construction state (gear back to mid-cassette, fatigue gone).
    pub fn reset(&mut self) {
        self.cadence_rpm = FALLBACK_CADENCE_RPM;
        self.front_idx = 0;
        self.rear_idx = self.gearset.cassette.len() / 2;
        self.fatigue = 0.0;
        self.noise_rpm = 0.0;
        self.last_target_rpm = FALLBACK_CADENCE_RPM;
        self.last_front_shift_s = f64::NEG_INFINITY;
        self.last_rear_shift_s = f64::NEG_INFINITY;
        self.elapsed_s = 0.0;
    }

    /// Roll the dice on a shift and, if it fires, step one cog toward the
    /// gear whose cadence best matches the target.
    fn maybe_shift(&mut self, target: f64, grade_pct: f64, speed_mps: f64, dt: f64) {
        let current = self.gearset.cadence_from_gear(speed_mps, self.gear());

        let mut rate = SHIFT_BASE_RATE
            + (target - current).abs() / SHIFT_ERROR_SCALE_RPM * (2.0 / 60.0);
        if grade_pct.abs() > 5.0 {
            rate += SHIFT_STEEP_RATE;
        }
        let p_shift = 1.0 - (-rate * dt).exp();
        if self.rng.next_uniform() >= p_shift {
            return;
        }

        let (best_front, best_rear) = self.best_gear_for(target, speed_mps);
        if best_rear != self.rear_idx {
            if self.elapsed_s - self.last_rear_shift_s >= REAR_SHIFT_COOLDOWN_S {
                self.rear_idx = step_toward(self.rear_idx, best_rear);
                self.last_rear_shift_s = self.elapsed_s;
            }
        } else if best_front != self.front_idx
            && self.elapsed_s - self.last_front_shift_s >= FRONT_SHIFT_COOLDOWN_S
        {
            self.front_idx = step_toward(self.front_idx, best_front);
            self.last_front_shift_s = self.elapsed_s;
            // Chainring changes briefly interrupt the pedal stroke.
            self.cadence_rpm = (self.cadence_rpm - FRONT_SHIFT_TRANSIENT_RPM).max(0.0);
        }
    }

    /// Exhaustive search over the chainring×cassette cross product.
    fn best_gear_for(&self, target: f64, speed_mps: f64) -> (usize, usize) {
        let mut best = (self.front_idx, self.rear_idx);
        let mut best_err = f64::INFINITY;
        for (fi, &front) in self.gearset.chainrings.iter().enumerate() {
            for (ri, &rear) in self.gearset.cassette.iter().enumerate() {
                let cadence = self
                    .gearset
                    .cadence_from_gear(speed_mps, Gear { front, rear });
                let err = (target - cadence).abs();
                if err < best_err {
                    best_err = err;
                    best = (fi, ri);
                }
            }
        }
        best
    }

    /// Gear-implied cadence with the high-speed spin/coast caps applied.
    fn gear_cadence_with_limits(&self, power_w: f64, grade_pct: f64, speed_mps: f64) -> f64 {
        let cadence = self.gearset.cadence_from_gear(speed_mps, self.gear());
        let speed_kmh = speed_mps * 3.6;

        let mut limited = if speed_kmh > 55.0 && power_w < 150.0 {
            // Spun out and soft pedalling: coast.
            0.0
        } else if speed_kmh > 55.0 {
            cadence.min(110.0)
        } else if speed_kmh > 45.0 && grade_pct < -5.0 {
            (0.6 * cadence).min(100.0)
        } else if speed_kmh > 45.0 {
            cadence.min(120.0)
        } else if speed_kmh > 35.0 && grade_pct < -8.0 {
            (0.7 * cadence).min(90.0)
        } else {
            cadence
        };

        if speed_mps < 1.5 {
            limited = limited.min(50.0);
        }
        limited
    }

    /// W'-style fatigue: charge above FTP, exponential recovery below.
    fn update_fatigue(&mut self, power_w: f64, dt: f64) {
        let frac = power_w / self.ftp_w.max(1.0);
        if frac > 1.0 {
            self.fatigue += (frac - 1.0) * dt / 600.0;
        } else {
            self.fatigue *= (-dt / 300.0).exp();
        }
        self.fatigue = self.fatigue.clamp(0.0, 1.0);
    }
}

/// Move one index step toward `target`.
fn step_toward(current: usize, target: usize) -> usize {
    match target.cmp(&current) {
        std::cmp::Ordering::Greater => current + 1,
        std::cmp::Ordering::Less => current - 1,
        std::cmp::Ordering::Equal => current,
    }
}
