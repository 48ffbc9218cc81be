// flight_computer.rs: sources → phase → altitude → fusion → health → mode, once per tick
//
// The computer owns every core component. Collaborators are borrowed for the
// duration of a call through `Hardware`, and "now" is passed in once per
// cycle so every component sees the same clock.

use std::path::Path;

use crate::attitude::AttitudeTracker;
use crate::config::VarioConfig;
use crate::error::LoadError;
use crate::filters::altitude::{AltitudeEstimator, VarioCue};
use crate::health_monitor::HealthSupervisor;
use crate::igc::LogParser;
use crate::live_status::{current_timestamp, LiveStatus};
use crate::mode_machine::{ModeSignals, ModeTransition, OperatingModeMachine};
use crate::phase::PhaseDetector;
use crate::power::{PowerAlert, PowerMonitor};
use crate::replay::ReplayEngine;
use crate::sensor_fusion::{FusionEngine, FusionInputs};
use crate::sensors::{AlertKind, Clock, Hardware};
use crate::types::{AttitudeSample, FlightPhase, FlightSnapshot, GpsFix, LogRecord, OperatingMode};

// ─── Per-cycle data ──────────────────────────────────────────────────────────

/// Raw inputs for one cycle, from exactly one source.
#[derive(Clone, Copy, Debug)]
struct CycleSource {
    gps: GpsFix,
    raw_altitude: Option<f32>,
    attitude: AttitudeSample,
    pressure: Option<f32>,
    temperature: Option<f32>,
}

/// What one call to [`FlightComputer::tick`] produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    pub now_ms: u32,
    pub snapshot: FlightSnapshot,
    pub mode: OperatingMode,
    pub phase: FlightPhase,
    pub cue: VarioCue,
    pub transition: Option<ModeTransition>,
    /// Replay's own finite-difference vario, when this cycle came from replay.
    pub reference_vertical_speed: Option<f32>,
    pub from_replay: bool,
}

// ─── Flight computer ─────────────────────────────────────────────────────────

pub struct FlightComputer {
    config: VarioConfig,
    altitude: AltitudeEstimator,
    phase: PhaseDetector,
    attitude: AttitudeTracker,
    fusion: FusionEngine,
    health: HealthSupervisor,
    modes: OperatingModeMachine,
    power: PowerMonitor,
    replay: ReplayEngine,
    replay_enabled: bool,
    reference_vs: Option<f32>,
    had_fix: bool,
    last_tick_ms: Option<u32>,
    first_tick_ms: Option<u32>,
    cycle_count: u64,
}

impl FlightComputer {
    /// Build the core and seed the altitude filter from one barometer read.
    pub fn new(config: VarioConfig, hw: &mut Hardware<'_>) -> Self {
        let mut altitude = AltitudeEstimator::new(config.altitude.clone());
        match hw.barometer.read_pressure() {
            Ok(p) => {
                let seed = hw.barometer.altitude_from_pressure(p, config.qnh_hpa);
                altitude.seed(seed);
                log::info!("[VARIO] seeded altitude {:.1} m from {:.2} hPa", seed, p);
            }
            Err(e) => log::warn!("[VARIO] no barometer seed, starting at 0 m: {}", e),
        }
        hw.audio.play_alert(AlertKind::Startup);

        Self {
            phase: PhaseDetector::new(config.phase.clone()),
            attitude: AttitudeTracker::new(),
            fusion: FusionEngine::new(config.fusion.clone()),
            health: HealthSupervisor::new(&config.health),
            modes: OperatingModeMachine::new(config.modes.clone()),
            power: PowerMonitor::new(
                config.low_battery_warning,
                config.critical_battery_level,
                &config.power,
            ),
            replay: ReplayEngine::new(),
            replay_enabled: false,
            reference_vs: None,
            had_fix: false,
            last_tick_ms: None,
            first_tick_ms: None,
            cycle_count: 0,
            altitude,
            config,
        }
    }

    /// Read the clock once and run a cycle.
    pub fn run_cycle(&mut self, hw: &mut Hardware<'_>, clock: &dyn Clock) -> CycleReport {
        self.tick(hw, clock.now_millis())
    }

    pub fn tick(&mut self, hw: &mut Hardware<'_>, now_ms: u32) -> CycleReport {
        let from_replay = self.replay_enabled;
        let source = if from_replay {
            self.replay_source(now_ms)
        } else {
            self.reference_vs = None;
            self.live_source(hw)
        };

        if source.gps.has_valid_fix && !self.had_fix {
            hw.audio.play_alert(AlertKind::GpsFix);
        }
        self.had_fix = source.gps.has_valid_fix;

        // Power is always live
        let voltage = hw.power.battery_voltage();
        let charging = hw.power.is_charging();
        match self.power.update(voltage, charging, now_ms) {
            Some(PowerAlert::Critical) => hw.audio.play_alert(AlertKind::Error),
            Some(PowerAlert::LowBattery) => hw.audio.play_alert(AlertKind::LowBattery),
            None => {}
        }

        let phase = self.phase.update(source.gps.speed);

        let dt_seconds = self
            .last_tick_ms
            .map(|last| now_ms.wrapping_sub(last) as f32 / 1000.0)
            .unwrap_or(0.0);
        let estimate = self.altitude.update(source.raw_altitude, dt_seconds);
        match estimate.cue {
            VarioCue::Lift { freq_hz } | VarioCue::Sink { freq_hz } => {
                hw.audio.tone(freq_hz, self.config.altitude.tone_duration_ms)
            }
            VarioCue::Quiet => hw.audio.no_tone(),
        }

        let attitude = self.attitude.update(source.attitude);

        let snapshot = self.fusion.fuse(
            &FusionInputs {
                altitude: estimate.altitude,
                vertical_speed: estimate.vertical_speed,
                gps: source.gps,
                attitude,
                pressure: source.pressure,
                temperature: source.temperature,
            },
            now_ms,
        );

        self.health.check(&snapshot, now_ms);

        let signals = ModeSignals {
            battery_critical: self.power.is_critical(),
            battery_voltage: voltage,
            phase,
        };
        let mut init = || hw.initialize_sensors();
        let transition = self.modes.update(&mut self.health, &signals, now_ms, &mut init);

        if let Some(t) = transition {
            self.on_transition(t, hw);
        }

        self.last_tick_ms = Some(now_ms);
        self.first_tick_ms.get_or_insert(now_ms);
        self.cycle_count += 1;

        CycleReport {
            now_ms,
            snapshot,
            mode: self.modes.mode(),
            phase: self.phase.phase(),
            cue: estimate.cue,
            transition,
            reference_vertical_speed: self.reference_vs,
            from_replay,
        }
    }

    fn replay_source(&mut self, now_ms: u32) -> CycleSource {
        self.replay.update(now_ms);
        let snap = self.replay.current_snapshot();

        // The finishing cycle still uses the final replay values
        if !self.replay.is_active() {
            log::info!("[REPLAY] finished, switching to live sensors");
            self.disable_replay();
        }
        self.reference_vs = Some(snap.vertical_speed);

        CycleSource {
            gps: snap.gps,
            raw_altitude: Some(snap.baro_altitude),
            attitude: snap.attitude,
            pressure: None,
            temperature: None,
        }
    }

    fn live_source(&mut self, hw: &mut Hardware<'_>) -> CycleSource {
        hw.gps.update();
        let gps = hw.gps.current_fix();

        let pressure = match hw.barometer.read_pressure() {
            Ok(p) => Some(p),
            Err(e) => {
                log::debug!("[VARIO] {}", e);
                None
            }
        };
        let temperature = hw.barometer.read_temperature().ok();
        let raw_altitude =
            pressure.map(|p| hw.barometer.altitude_from_pressure(p, self.config.qnh_hpa));

        CycleSource {
            gps,
            raw_altitude,
            attitude: hw.imu.current_attitude(),
            pressure,
            temperature,
        }
    }

    fn on_transition(&mut self, t: ModeTransition, hw: &mut Hardware<'_>) {
        match (t.from, t.to) {
            // Every way back to Ready starts a new session
            (from, OperatingMode::Ready) => {
                if from == OperatingMode::FlightActive {
                    log::info!("[VARIO] landing confirmed, session closed");
                }
                self.phase.reset();
            }
            (_, OperatingMode::Error) => hw.audio.play_alert(AlertKind::Error),
            _ => {}
        }
    }

    // ─── Replay control ─────────────────────────────────────────────────────

    /// Route subsequent cycles through `records`. Starting a replay starts a
    /// new session: the phase returns to Ground and the altitude filter is
    /// re-seeded from the first record.
    pub fn enable_replay(&mut self, records: Vec<LogRecord>, now_ms: u32) -> bool {
        let first_baro = match records.first() {
            Some(r) => r.baro_altitude,
            None => return false,
        };
        if !self.replay.activate(records, now_ms) {
            return false;
        }
        self.replay_enabled = true;
        self.reference_vs = None;
        self.phase.reset();
        self.altitude.seed(first_baro);
        true
    }

    /// Load and start a replay. A load failure leaves live operation as it was.
    pub fn enable_replay_from_file(&mut self, path: &Path, now_ms: u32) -> Result<usize, LoadError> {
        let records = LogParser::load(path)?;
        let count = records.len();
        if !self.enable_replay(records, now_ms) {
            return Err(LoadError::NoRecords {
                path: path.to_path_buf(),
            });
        }
        Ok(count)
    }

    pub fn disable_replay(&mut self) {
        self.replay.deactivate();
        self.replay_enabled = false;
        self.reference_vs = None;
    }

    // ─── Outputs ────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> FlightSnapshot {
        self.fusion.snapshot()
    }

    pub fn mode(&self) -> OperatingMode {
        self.modes.mode()
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase.phase()
    }

    pub fn health(&self) -> &HealthSupervisor {
        &self.health
    }

    pub fn power(&self) -> &PowerMonitor {
        &self.power
    }

    pub fn altitude_estimator(&self) -> &AltitudeEstimator {
        &self.altitude
    }

    pub fn replay_active(&self) -> bool {
        self.replay_enabled
    }

    pub fn reference_vertical_speed(&self) -> Option<f32> {
        self.reference_vs
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn config(&self) -> &VarioConfig {
        &self.config
    }

    pub fn status(&self) -> LiveStatus {
        let snap = self.fusion.snapshot();
        let uptime_ms = match (self.first_tick_ms, self.last_tick_ms) {
            (Some(first), Some(last)) => last.wrapping_sub(first),
            _ => 0,
        };
        LiveStatus {
            timestamp: current_timestamp(),
            uptime_ms,
            mode: self.mode(),
            phase: self.phase(),
            altitude: snap.altitude,
            vertical_speed: snap.vertical_speed,
            snapshot_valid: snap.is_valid,
            gps_lat: snap.gps.latitude,
            gps_lon: snap.gps.longitude,
            gps_speed: snap.gps.speed,
            gps_fix: snap.gps.has_valid_fix,
            battery_voltage: self.power.voltage(),
            health_error: Some(self.health.last_error().to_string()).filter(|e| !e.is_empty()),
            replay_active: self.replay_enabled,
            cycle_count: self.cycle_count,
        }
    }
}
