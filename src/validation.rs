//! Range classification for telemetry values.
//!
//! Diagnostics only: a reading outside its plausible band is reported with a
//! severity level and a human-readable message, and callers may clamp it to
//! the safe envelope. Nothing here ever aborts the pipeline.

use serde::{Deserialize, Serialize};

/// How believable a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// Within the normal band.
    Valid,
    /// Unusual but possible.
    Warning,
    /// Outside what the simulation should ever produce.
    Error,
    /// Physically implausible.
    Critical,
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning => write!(f, "Warning"),
            ValidationLevel::Error => write!(f, "Error"),
            ValidationLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Which telemetry channel a result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Power,
    Speed,
    Cadence,
    Grade,
    HeartRate,
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parameter::Power => write!(f, "power"),
            Parameter::Speed => write!(f, "speed"),
            Parameter::Cadence => write!(f, "cadence"),
            Parameter::Grade => write!(f, "grade"),
            Parameter::HeartRate => write!(f, "heart rate"),
        }
    }
}

/// Rider ability bracket used to scale the power bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderCategory {
    #[default]
    Recreational,
    Competitive,
    Elite,
}

impl RiderCategory {
    /// Multiplier applied to the power warning/error thresholds.
    fn power_scale(self) -> f64 {
        match self {
            RiderCategory::Recreational => 1.0,
            RiderCategory::Competitive => 1.3,
            RiderCategory::Elite => 1.6,
        }
    }
}

/// Outcome of a single classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub level: ValidationLevel,
    pub message: String,
    pub parameter: Parameter,
}

impl ValidationResult {
    fn ok(parameter: Parameter) -> Self {
        Self {
            level: ValidationLevel::Valid,
            message: String::new(),
            parameter,
        }
    }

    fn flag(parameter: Parameter, level: ValidationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            parameter,
        }
    }

    /// True when the value needs no attention.
    pub fn is_valid(&self) -> bool {
        self.level == ValidationLevel::Valid
    }
}

/// Classify a power reading, optionally scaled by rider category.
pub fn validate_power(watts: f64, category: Option<RiderCategory>) -> ValidationResult {
    let scale = category.unwrap_or_default().power_scale();
    if !watts.is_finite() {
        return ValidationResult::flag(
            Parameter::Power,
            ValidationLevel::Critical,
            "power is not a finite number",
        );
    }
    if watts < 0.0 {
        return ValidationResult::flag(
            Parameter::Power,
            ValidationLevel::Error,
            format!("negative power {:.0} W", watts),
        );
    }
    if watts > 2500.0 {
        return ValidationResult::flag(
            Parameter::Power,
            ValidationLevel::Critical,
            format!("{:.0} W exceeds the trainer ceiling", watts),
        );
    }
    if watts > 1500.0 * scale {
        return ValidationResult::flag(
            Parameter::Power,
            ValidationLevel::Error,
            format!("{:.0} W is beyond a sustained human effort", watts),
        );
    }
    if watts > 1000.0 * scale {
        return ValidationResult::flag(
            Parameter::Power,
            ValidationLevel::Warning,
            format!("{:.0} W sprint-level reading", watts),
        );
    }
    ValidationResult::ok(Parameter::Power)
}

/// Classify a ground speed reading in m/s.
pub fn validate_speed(speed_mps: f64) -> ValidationResult {
    if !speed_mps.is_finite() {
        return ValidationResult::flag(
            Parameter::Speed,
            ValidationLevel::Critical,
            "speed is not a finite number",
        );
    }
    if speed_mps < 0.0 {
        return ValidationResult::flag(
            Parameter::Speed,
            ValidationLevel::Error,
            format!("negative speed {:.1} m/s", speed_mps),
        );
    }
    if speed_mps > 35.0 {
        return ValidationResult::flag(
            Parameter::Speed,
            ValidationLevel::Error,
            format!("{:.1} m/s beyond the descent cap", speed_mps),
        );
    }
    if speed_mps > 25.0 {
        return ValidationResult::flag(
            Parameter::Speed,
            ValidationLevel::Warning,
            format!("{:.1} m/s only plausible downhill", speed_mps),
        );
    }
    ValidationResult::ok(Parameter::Speed)
}

/// Classify a cadence reading in rpm.
pub fn validate_cadence(cadence_rpm: f64) -> ValidationResult {
    if !cadence_rpm.is_finite() {
        return ValidationResult::flag(
            Parameter::Cadence,
            ValidationLevel::Critical,
            "cadence is not a finite number",
        );
    }
    if cadence_rpm < 0.0 {
        return ValidationResult::flag(
            Parameter::Cadence,
            ValidationLevel::Error,
            format!("negative cadence {:.0} rpm", cadence_rpm),
        );
    }
    if cadence_rpm > 180.0 {
        return ValidationResult::flag(
            Parameter::Cadence,
            ValidationLevel::Error,
            format!("{:.0} rpm above the model ceiling", cadence_rpm),
        );
    }
    if cadence_rpm > 130.0 {
        return ValidationResult::flag(
            Parameter::Cadence,
            ValidationLevel::Warning,
            format!("{:.0} rpm spin-out territory", cadence_rpm),
        );
    }
    ValidationResult::ok(Parameter::Cadence)
}

/// Classify a road grade in percent.
pub fn validate_grade(grade_pct: f64) -> ValidationResult {
    if !grade_pct.is_finite() {
        return ValidationResult::flag(
            Parameter::Grade,
            ValidationLevel::Critical,
            "grade is not a finite number",
        );
    }
    if grade_pct.abs() > 30.0 {
        return ValidationResult::flag(
            Parameter::Grade,
            ValidationLevel::Error,
            format!("{:.1}% outside the simulated range", grade_pct),
        );
    }
    if grade_pct.abs() > 20.0 {
        return ValidationResult::flag(
            Parameter::Grade,
            ValidationLevel::Warning,
            format!("{:.1}% steeper than most real roads", grade_pct),
        );
    }
    ValidationResult::ok(Parameter::Grade)
}

/// Classify a heart-rate reading in bpm.
pub fn validate_heart_rate(bpm: f64) -> ValidationResult {
    if !bpm.is_finite() {
        return ValidationResult::flag(
            Parameter::HeartRate,
            ValidationLevel::Critical,
            "heart rate is not a finite number",
        );
    }
    if !(20.0..=250.0).contains(&bpm) {
        return ValidationResult::flag(
            Parameter::HeartRate,
            ValidationLevel::Error,
            format!("{:.0} bpm outside human range", bpm),
        );
    }
    if bpm > 200.0 || bpm < 35.0 {
        return ValidationResult::flag(
            Parameter::HeartRate,
            ValidationLevel::Warning,
            format!("{:.0} bpm extreme reading", bpm),
        );
    }
    ValidationResult::ok(Parameter::HeartRate)
}

/// Clamp a value to the band the simulation is allowed to emit.
pub fn clamp_to_safe_limits(value: f64, parameter: Parameter) -> f64 {
    let clamped = match parameter {
        Parameter::Power => value.clamp(0.0, 2500.0),
        Parameter::Speed => value.clamp(0.0, 35.0),
        Parameter::Cadence => value.clamp(0.0, 180.0),
        Parameter::Grade => value.clamp(-30.0, 30.0),
        Parameter::HeartRate => value.clamp(30.0, 220.0),
    };
    if clamped.is_finite() {
        clamped
    } else {
        match parameter {
            Parameter::Speed => 5.0,
            Parameter::Cadence => 85.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_readings_are_valid() {
        assert!(validate_power(250.0, None).is_valid());
        assert!(validate_speed(9.0).is_valid());
        assert!(validate_cadence(90.0).is_valid());
        assert!(validate_grade(5.0).is_valid());
        assert!(validate_heart_rate(145.0).is_valid());
    }

    #[test]
    fn test_category_scales_power_bands() {
        // 1200 W: a sprint for an elite rider, a warning for everyone else.
        assert_eq!(
            validate_power(1200.0, Some(RiderCategory::Recreational)).level,
            ValidationLevel::Warning
        );
        assert!(validate_power(1200.0, Some(RiderCategory::Elite)).is_valid());
    }

    #[test]
    fn test_nan_is_critical() {
        assert_eq!(
            validate_speed(f64::NAN).level,
            ValidationLevel::Critical
        );
        assert_eq!(
            validate_power(f64::INFINITY, None).level,
            ValidationLevel::Critical
        );
    }

    #[test]
    fn test_clamp_to_safe_limits() {
        assert_eq!(clamp_to_safe_limits(-10.0, Parameter::Power), 0.0);
        assert_eq!(clamp_to_safe_limits(50.0, Parameter::Speed), 35.0);
        assert_eq!(clamp_to_safe_limits(200.0, Parameter::Cadence), 180.0);
        assert_eq!(clamp_to_safe_limits(-45.0, Parameter::Grade), -30.0);
        assert_eq!(clamp_to_safe_limits(f64::NAN, Parameter::Cadence), 85.0);
    }

    #[test]
    fn test_levels_escalate_with_magnitude() {
        assert_eq!(validate_power(1100.0, None).level, ValidationLevel::Warning);
        assert_eq!(validate_power(1800.0, None).level, ValidationLevel::Error);
        assert_eq!(validate_power(3000.0, None).level, ValidationLevel::Critical);
    }
}
