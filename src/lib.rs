//! VeloTrain - Virtual Indoor Cycling Trainer
//!
//! Emulates a smart trainer over BLE: advertises the Fitness Machine,
//! Cycling Power and Running Speed and Cadence services, streams plausible
//! cycling telemetry from a deterministic simulation engine, and honors the
//! FTMS Control Point for target power, simulation parameters, start/stop,
//! reset and spin-down. The BLE host stack is a pluggable transport.

// Core modules
pub mod ble;
pub mod config;
pub mod events;
pub mod metrics;
pub mod sim;
pub mod validation;

// Re-export commonly used types
pub use ble::peripheral::PeripheralCoordinator;
pub use ble::{ControlPoint, ControlState, Transport, TransportEvent};
pub use config::EmulatorConfig;
pub use events::{BroadcastState, EmulatorUpdate, LiveStats};
pub use sim::{SimulationEngine, SimulationInput, SimulationState};
