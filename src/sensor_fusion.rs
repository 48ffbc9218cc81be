// sensor_fusion.rs: merge per-cycle estimates into one FlightSnapshot
//
// Pure computation: no collaborators, no clock reads. The caller passes the
// cycle's estimates and "now"; the engine owns the single snapshot and hands
// out copies.

use serde::{Deserialize, Serialize};

use crate::types::{AttitudeSample, FlightSnapshot, GpsFix};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub stale_after_ms: u32,
    pub min_altitude: f32,
    pub max_altitude: f32,
    pub max_abs_vertical_speed: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: 5000,
            min_altitude: -500.0,
            max_altitude: 10_000.0,
            max_abs_vertical_speed: 30.0,
        }
    }
}

// ─── Inputs / validation results ─────────────────────────────────────────────

/// Everything the fusion step consumes in one cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct FusionInputs {
    pub altitude: f32,
    pub vertical_speed: f32,
    pub gps: GpsFix,
    pub attitude: AttitudeSample,
    /// `None` keeps the previous reading (replay has no pressure sensor).
    pub pressure: Option<f32>,
    pub temperature: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValidationIssue {
    Stale { age_ms: u32 },
    AltitudeOutOfRange { altitude: f32 },
    VerticalSpeedOutOfRange { vertical_speed: f32 },
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct FusionEngine {
    config: FusionConfig,
    snapshot: FlightSnapshot,
    issues: Vec<ValidationIssue>,
    fused_count: u64,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            snapshot: FlightSnapshot::default(),
            issues: Vec::with_capacity(3),
            fused_count: 0,
        }
    }

    /// Build this cycle's snapshot. Never fails: an implausible snapshot is
    /// returned with `is_valid == false`.
    pub fn fuse(&mut self, inputs: &FusionInputs, now_ms: u32) -> FlightSnapshot {
        let snap = &mut self.snapshot;

        snap.altitude = inputs.altitude;
        snap.vertical_speed = inputs.vertical_speed;
        if let Some(p) = inputs.pressure {
            snap.pressure = p;
        }
        if let Some(t) = inputs.temperature {
            snap.temperature = t;
        }
        snap.gps = inputs.gps;
        snap.attitude = inputs.attitude;

        // Timestamp only advances on a valid fix so staleness shows downstream
        if inputs.gps.has_valid_fix {
            snap.timestamp = now_ms;
        }

        validate(snap, now_ms, &self.config, &mut self.issues);
        snap.is_valid = self.issues.is_empty();
        self.fused_count += 1;

        *snap
    }

    pub fn snapshot(&self) -> FlightSnapshot {
        self.snapshot
    }

    pub fn is_data_valid(&self) -> bool {
        self.snapshot.is_valid
    }

    /// Reasons the last snapshot was marked invalid.
    pub fn last_issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn fused_count(&self) -> u64 {
        self.fused_count
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }
}

fn validate(
    snap: &FlightSnapshot,
    now_ms: u32,
    config: &FusionConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    issues.clear();

    let age_ms = now_ms.wrapping_sub(snap.timestamp);
    if age_ms > config.stale_after_ms {
        issues.push(ValidationIssue::Stale { age_ms });
    }
    if !(config.min_altitude..=config.max_altitude).contains(&snap.altitude) {
        issues.push(ValidationIssue::AltitudeOutOfRange {
            altitude: snap.altitude,
        });
    }
    if !(snap.vertical_speed.abs() <= config.max_abs_vertical_speed) {
        issues.push(ValidationIssue::VerticalSpeedOutOfRange {
            vertical_speed: snap.vertical_speed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(altitude: f32, vertical_speed: f32, valid_fix: bool) -> FusionInputs {
        FusionInputs {
            altitude,
            vertical_speed,
            gps: GpsFix {
                has_valid_fix: valid_fix,
                ..GpsFix::default()
            },
            ..FusionInputs::default()
        }
    }

    #[test]
    fn test_altitude_bounds_inclusive() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        assert!(fusion.fuse(&inputs(-500.0, 0.0, true), 1000).is_valid);
        assert!(fusion.fuse(&inputs(10_000.0, 0.0, true), 1000).is_valid);
        assert!(!fusion.fuse(&inputs(-500.01, 0.0, true), 1000).is_valid);
        assert!(!fusion.fuse(&inputs(10_000.01, 0.0, true), 1000).is_valid);
        assert!(matches!(
            fusion.last_issues(),
            [ValidationIssue::AltitudeOutOfRange { .. }]
        ));
    }

    #[test]
    fn test_issues_buffer_is_reused() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        fusion.fuse(&inputs(20_000.0, 99.0, false), 9000);
        assert_eq!(fusion.last_issues().len(), 3);
        let buffer = fusion.last_issues().as_ptr();

        fusion.fuse(&inputs(100.0, 0.0, true), 9100);
        assert!(fusion.last_issues().is_empty());
        fusion.fuse(&inputs(100.0, 99.0, true), 9200);
        assert!(matches!(
            fusion.last_issues(),
            [ValidationIssue::VerticalSpeedOutOfRange { .. }]
        ));
        assert_eq!(fusion.last_issues().as_ptr(), buffer);
    }

    #[test]
    fn test_vertical_speed_bounds_inclusive() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        assert!(fusion.fuse(&inputs(100.0, 30.0, true), 1000).is_valid);
        assert!(fusion.fuse(&inputs(100.0, -30.0, true), 1000).is_valid);
        assert!(!fusion.fuse(&inputs(100.0, 30.01, true), 1000).is_valid);
        assert!(!fusion.fuse(&inputs(100.0, -30.01, true), 1000).is_valid);
        assert!(!fusion.fuse(&inputs(100.0, f32::NAN, true), 1000).is_valid);
    }

    #[test]
    fn test_timestamp_only_advances_on_valid_fix() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        let snap = fusion.fuse(&inputs(100.0, 0.0, true), 2000);
        assert_eq!(snap.timestamp, 2000);

        let snap = fusion.fuse(&inputs(100.0, 0.0, false), 4000);
        assert_eq!(snap.timestamp, 2000);
        assert!(snap.is_valid);

        // exactly 5000 ms old is still fresh
        let snap = fusion.fuse(&inputs(100.0, 0.0, false), 7000);
        assert!(snap.is_valid);

        let snap = fusion.fuse(&inputs(100.0, 0.0, false), 7001);
        assert!(!snap.is_valid);
        assert_eq!(fusion.last_issues(), &[ValidationIssue::Stale { age_ms: 5001 }]);
    }

    #[test]
    fn test_never_fixed_goes_stale() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        assert!(fusion.fuse(&inputs(100.0, 0.0, false), 4000).is_valid);
        assert!(!fusion.fuse(&inputs(100.0, 0.0, false), 6000).is_valid);
    }

    #[test]
    fn test_staleness_survives_clock_wrap() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        fusion.fuse(&inputs(100.0, 0.0, true), u32::MAX - 1000);
        let snap = fusion.fuse(&inputs(100.0, 0.0, false), 2000);
        assert!(snap.is_valid); // 3001 ms elapsed across the wrap
    }

    #[test]
    fn test_pressure_retained_when_absent() {
        let mut fusion = FusionEngine::new(FusionConfig::default());
        let mut with_baro = inputs(100.0, 0.0, true);
        with_baro.pressure = Some(1001.5);
        with_baro.temperature = Some(18.0);
        fusion.fuse(&with_baro, 100);

        let snap = fusion.fuse(&inputs(101.0, 0.0, true), 200);
        assert_eq!(snap.pressure, 1001.5);
        assert_eq!(snap.temperature, 18.0);
        assert_eq!(snap.altitude, 101.0);
        assert_eq!(fusion.fused_count(), 2);
    }
}
