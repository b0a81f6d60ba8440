//! Cycling simulation engine: power variance, trainer smoothing, speed
//! physics, cadence/gearing and fatigue, composed per tick.

pub mod cadence;
pub mod engine;
pub mod power;
pub mod rng;
pub mod speed;
pub mod variance;

pub use cadence::{CadenceModel, Gear, Gearset};
pub use engine::{SimulationEngine, SimulationInput, SimulationState};
pub use power::PowerSmoother;
pub use rng::SeededRng;
pub use speed::{calculate_power_required, calculate_speed, RiderParams};
pub use variance::PowerVariance;
