use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::filters::altitude::AltitudeConfig;
use crate::health_monitor::HealthConfig;
use crate::mode_machine::ModeTimings;
use crate::phase::PhaseThresholds;
use crate::power::PowerConfig;
use crate::sensor_fusion::FusionConfig;

/// Every tunable the core reads. Consumed read-only each cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarioConfig {
    // ── Barometer ──
    pub qnh_hpa: f32,

    // ── Battery (volts) ──
    pub low_battery_warning: f32,
    pub critical_battery_level: f32,

    // ── Components ──
    pub altitude: AltitudeConfig,
    pub phase: PhaseThresholds,
    pub fusion: FusionConfig,
    pub health: HealthConfig,
    pub modes: ModeTimings,
    pub power: PowerConfig,
}

impl Default for VarioConfig {
    fn default() -> Self {
        Self {
            qnh_hpa: 1013.25,
            low_battery_warning: 3.6,
            critical_battery_level: 3.4,
            altitude: AltitudeConfig::default(),
            phase: PhaseThresholds::default(),
            fusion: FusionConfig::default(),
            health: HealthConfig::default(),
            modes: ModeTimings::default(),
            power: PowerConfig::default(),
        }
    }
}

impl VarioConfig {
    /// Load a JSON config; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::altitude::VerticalSpeedFormula;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = VarioConfig::from_json(
            r#"{ "critical_battery_level": 3.3, "altitude": { "vertical_speed_formula": "PreviousAltitudeBaseline" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.critical_battery_level, 3.3);
        assert_eq!(cfg.low_battery_warning, 3.6);
        assert_eq!(
            cfg.altitude.vertical_speed_formula,
            VerticalSpeedFormula::PreviousAltitudeBaseline
        );
        assert_eq!(cfg.modes.landing_confirmation_ms, 30_000);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = VarioConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let path = std::env::temp_dir().join("vario_core_bad_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = VarioConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
