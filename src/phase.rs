use serde::{Deserialize, Serialize};

use crate::types::FlightPhase;

/// Ground speed thresholds in m/s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub takeoff_speed: f32, // Ground -> Takeoff, ~18 km/h
    pub flying_speed: f32,  // Takeoff -> Flying, ~29 km/h
    pub landing_speed: f32, // Flying -> Landed, ~11 km/h
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            takeoff_speed: 5.0,
            flying_speed: 8.0,
            landing_speed: 3.0,
        }
    }
}

/// One-way hysteresis classifier: Ground -> Takeoff -> Flying -> Landed.
///
/// Nothing here moves the phase backwards; only [`PhaseDetector::reset`]
/// (a new session) returns it to `Ground`.
pub struct PhaseDetector {
    phase: FlightPhase,
    thresholds: PhaseThresholds,
}

impl PhaseDetector {
    pub fn new(thresholds: PhaseThresholds) -> Self {
        Self {
            phase: FlightPhase::Ground,
            thresholds,
        }
    }

    pub fn update(&mut self, ground_speed: f32) -> FlightPhase {
        self.phase = next_phase(self.phase, ground_speed, &self.thresholds);
        self.phase
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = FlightPhase::Ground;
    }
}

/// Transition table. NaN speeds never satisfy a comparison and hold the phase.
pub fn next_phase(phase: FlightPhase, speed: f32, t: &PhaseThresholds) -> FlightPhase {
    match phase {
        FlightPhase::Ground if speed > t.takeoff_speed => FlightPhase::Takeoff,
        FlightPhase::Takeoff if speed > t.flying_speed => FlightPhase::Flying,
        FlightPhase::Flying if speed < t.landing_speed => FlightPhase::Landed,
        other => other,
    }
}
