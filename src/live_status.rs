use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{FlightPhase, OperatingMode};

/// Point-in-time view of the flight computer for an external display.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_ms: u32,
    pub mode: OperatingMode,
    pub phase: FlightPhase,
    // Vario
    pub altitude: f32,
    pub vertical_speed: f32,
    pub snapshot_valid: bool,
    // GPS data
    pub gps_lat: f64,
    pub gps_lon: f64,
    pub gps_speed: f32,
    pub gps_fix: bool,
    // Power / health
    pub battery_voltage: f32,
    pub health_error: Option<String>,
    pub replay_active: bool,
    pub cycle_count: u64,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            uptime_ms: 0,
            mode: OperatingMode::default(),
            phase: FlightPhase::default(),
            altitude: 0.0,
            vertical_speed: 0.0,
            snapshot_valid: false,
            gps_lat: 0.0,
            gps_lon: 0.0,
            gps_speed: 0.0,
            gps_fix: false,
            battery_voltage: 0.0,
            health_error: None,
            replay_active: false,
            cycle_count: 0,
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_writes_readable_json() {
        let mut status = LiveStatus::new();
        status.mode = OperatingMode::FlightActive;
        status.health_error = Some("Sensor data stale".into());

        let path = std::env::temp_dir().join("vario_core_live_status.json");
        status.save(&path).unwrap();
        let back: LiveStatus = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, status);
        let _ = fs::remove_file(&path);
    }
}
