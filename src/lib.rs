//! Flight-instrument core for a paraglider variometer.
//!
//! Every component is synchronous and driven by [`flight_computer::FlightComputer`],
//! one cycle per external tick. Hardware sits behind the traits in [`sensors`].

pub mod attitude;
pub mod config;
pub mod error;
pub mod filters;
pub mod flight_computer;
pub mod health_monitor;
pub mod igc;
pub mod live_status;
pub mod mode_machine;
pub mod phase;
pub mod power;
pub mod replay;
pub mod retry_gate;
pub mod sensor_fusion;
pub mod sensors;
pub mod types;

pub use config::VarioConfig;
pub use error::{ConfigError, LoadError, SensorError};
pub use flight_computer::{CycleReport, FlightComputer};
pub use types::{FlightPhase, FlightSnapshot, GpsFix, LogRecord, OperatingMode};
