//! Power-to-speed physics.
//!
//! Inverts the cycling power equation (gravity + rolling + aerodynamic drag)
//! with Newton–Raphson iteration, plus a dedicated descent branch that
//! anchors the solution to the terminal coasting velocity.

use serde::{Deserialize, Serialize};

/// Air density at sea level, kg/m³.
const AIR_DENSITY: f64 = 1.225;
/// Gravitational acceleration, m/s².
const GRAVITY: f64 = 9.81;

/// Rider and bike parameters fed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderParams {
    /// Total system mass (rider + bike), kg.
    pub mass_kg: f64,
    /// Rolling resistance coefficient.
    pub crr: f64,
    /// Drag coefficient times frontal area, m².
    pub cda: f64,
    /// Drivetrain efficiency (fraction of pedal power reaching the wheel).
    pub drivetrain_efficiency: f64,
    /// Functional threshold power, watts.
    pub ftp_w: f64,
}

impl Default for RiderParams {
    fn default() -> Self {
        Self {
            mass_kg: 75.0,
            crr: 0.004,
            cda: 0.32,
            drivetrain_efficiency: 0.97,
            ftp_w: 250.0,
        }
    }
}

/// Solve for speed in m/s given pedal power and grade.
///
/// Inputs are clamped (power to ≥ 0, grade to ±30%); the result is always
/// finite and non-negative.
pub fn calculate_speed(power_w: f64, grade_pct: f64, params: &RiderParams) -> f64 {
    let power = power_w.max(0.0);
    let grade = grade_pct.clamp(-30.0, 30.0);
    let theta = (grade / 100.0).atan();
    let effective_power = power * params.drivetrain_efficiency;

    let mass = params.mass_kg;
    let f_grade = mass * GRAVITY * theta.sin();
    let f_roll = mass * GRAVITY * params.crr * theta.cos();

    if grade < -2.0 {
        // Gravity assists: F_grade is negative, so the parallel component
        // pushing the rider forward is its negation.
        let f_gravity_forward = -f_grade;
        let f_net = f_gravity_forward - f_roll;
        if f_net > 0.0 {
            let v_terminal = (2.0 * f_net / (params.cda * AIR_DENSITY)).sqrt();
            if effective_power <= 10.0 {
                // Coasting: the descent sets the pace.
                return v_terminal.min(30.0);
            }
            return solve_descent(effective_power, f_gravity_forward, f_roll, v_terminal, params);
        }
        // Shallow descent where rolling resistance wins: fall through to the
        // general solver.
    }

    solve_newton(effective_power, grade, f_grade, f_roll, params)
}

/// Pedalling on a real descent: damped fixed-point iteration seeded at the
/// terminal velocity.
fn solve_descent(
    effective_power: f64,
    f_gravity_forward: f64,
    f_roll: f64,
    v_terminal: f64,
    params: &RiderParams,
) -> f64 {
    let mass = params.mass_kg;
    let mut v = v_terminal;

    for _ in 0..10 {
        let f_air = 0.5 * params.cda * AIR_DENSITY * v * v;
        let f_required = f_air - f_gravity_forward + f_roll;
        let p_required = f_required * v;
        if (effective_power - p_required).abs() < 5.0 {
            break;
        }
        let delta = (effective_power - p_required) / (mass * v + params.cda * AIR_DENSITY * v * v);
        v += 0.5 * delta;
    }

    let v = v.clamp(0.8 * v_terminal, 35.0);
    if v.is_finite() {
        v
    } else {
        5.0
    }
}

/// Flat and climbing solve: Newton–Raphson on the power balance.
fn solve_newton(
    effective_power: f64,
    grade: f64,
    f_grade: f64,
    f_roll: f64,
    params: &RiderParams,
) -> f64 {
    let drag_coeff = 0.5 * params.cda * AIR_DENSITY;
    let mut v = (effective_power / drag_coeff).sqrt().clamp(1.0, 10.0);

    for _ in 0..15 {
        let f = (f_grade + f_roll + drag_coeff * v * v) * v - effective_power;
        let df = f_grade + f_roll + 3.0 * drag_coeff * v * v;
        if df.abs() < 1e-10 {
            break;
        }
        let v_next = (v - f / df).max(0.1);
        let step = v_next - v;
        v = v_next;
        if step.abs() < 0.001 {
            break;
        }
    }

    let bounded = if grade > 10.0 && effective_power < 100.0 {
        // Grinding up a wall: walking pace at best.
        v.clamp(0.5, 5.0)
    } else if grade < -10.0 {
        v.clamp(5.0, 35.0)
    } else {
        v.clamp(0.5, 25.0)
    };

    if bounded.is_finite() {
        bounded
    } else {
        5.0
    }
}

/// Pedal power needed to hold `speed_mps` on `grade_pct`.
///
/// Inverse of [`calculate_speed`] on the flat/climb branch; used to verify
/// the solver round-trips.
pub fn calculate_power_required(speed_mps: f64, grade_pct: f64, params: &RiderParams) -> f64 {
    let grade = grade_pct.clamp(-30.0, 30.0);
    let theta = (grade / 100.0).atan();
    let mass = params.mass_kg;

    let f_grade = mass * GRAVITY * theta.sin();
    let f_roll = mass * GRAVITY * params.crr * theta.cos();
    let f_air = 0.5 * params.cda * AIR_DENSITY * speed_mps * speed_mps;

    (f_grade + f_roll + f_air) * speed_mps / params.drivetrain_efficiency
}
