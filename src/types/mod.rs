use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One GPS fix, either from the live receiver or synthesized by replay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,  // degrees, south negative
    pub longitude: f64, // degrees, west negative
    pub altitude: f32,  // meters MSL
    pub speed: f32,     // ground speed, m/s
    pub heading: f32,   // degrees
    pub satellites: u8,
    pub hdop: f32,
    pub timestamp: u32, // fix time, ms
    pub has_valid_fix: bool,
}

impl Default for GpsFix {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            speed: 0.0,
            heading: 0.0,
            satellites: 0,
            hdop: 99.9,
            timestamp: 0,
            has_valid_fix: false,
        }
    }
}

/// Orientation data from the IMU.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSample {
    pub pitch: f32, // degrees
    pub roll: f32,  // degrees
    pub yaw: f32,   // degrees, magnetic
    pub acceleration: Vector3<f32>,     // m/s^2
    pub angular_velocity: Vector3<f32>, // rad/s
    pub is_calibrated: bool,
}

impl Default for AttitudeSample {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
            acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            is_calibrated: false,
        }
    }
}

/// The fused flight state handed to consumers once per cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightSnapshot {
    pub altitude: f32,       // meters
    pub vertical_speed: f32, // m/s
    pub pressure: f32,       // hPa
    pub temperature: f32,    // °C
    pub gps: GpsFix,
    pub attitude: AttitudeSample,
    /// ms since boot of the last cycle that carried a valid GPS fix.
    pub timestamp: u32,
    pub is_valid: bool,
}

/// A single IGC B-record after parsing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: u32, // ms since local midnight
    pub latitude: f64,
    pub longitude: f64,
    pub gps_altitude: f32,
    pub baro_altitude: f32,
    pub speed: f32,
    pub heading: f32,
    pub satellites: u8,
    pub hdop: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightPhase {
    #[default]
    Ground,
    Takeoff,
    Flying,
    Landed,
}

impl FlightPhase {
    pub fn is_airborne(self) -> bool {
        matches!(self, FlightPhase::Takeoff | FlightPhase::Flying)
    }

    pub fn is_on_ground(self) -> bool {
        matches!(self, FlightPhase::Ground | FlightPhase::Landed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingMode {
    #[default]
    Initializing,
    Ready,
    FlightActive,
    LowPower,
    Error,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 5] = [
        OperatingMode::Initializing,
        OperatingMode::Ready,
        OperatingMode::FlightActive,
        OperatingMode::LowPower,
        OperatingMode::Error,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OperatingMode::Initializing => "initializing",
            OperatingMode::Ready => "ready",
            OperatingMode::FlightActive => "flight_active",
            OperatingMode::LowPower => "low_power",
            OperatingMode::Error => "error",
        }
    }
}
