//! Top-level operating mode state machine.
//!
//! Modes are a closed enum and the per-mode rules live in one `transition`
//! function. The only state besides the mode itself is a handful of timers,
//! reset by the enter/exit bookkeeping in [`OperatingModeMachine`].

use serde::{Deserialize, Serialize};

use crate::error::SensorResult;
use crate::health_monitor::HealthSupervisor;
use crate::retry_gate::RetryGate;
use crate::types::{FlightPhase, OperatingMode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeTimings {
    pub landing_confirmation_ms: u32,
    pub low_power_interval_ms: u32,
    pub low_power_recovery_voltage: f32,
    pub error_retry_interval_ms: u32,
}

impl Default for ModeTimings {
    fn default() -> Self {
        Self {
            landing_confirmation_ms: 30_000,
            low_power_interval_ms: 5000,
            low_power_recovery_voltage: 3.5,
            error_retry_interval_ms: 10_000,
        }
    }
}

/// Per-cycle inputs besides health, which the machine reads directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeSignals {
    pub battery_critical: bool,
    pub battery_voltage: f32,
    pub phase: FlightPhase,
}

/// Brings the sensor collaborators up. Called from Initializing and, paced,
/// from Error.
pub trait SensorInitializer {
    fn initialize_sensors(&mut self) -> SensorResult<()>;
}

impl<F> SensorInitializer for F
where
    F: FnMut() -> SensorResult<()>,
{
    fn initialize_sensors(&mut self) -> SensorResult<()> {
        self()
    }
}

#[derive(Clone, Debug)]
pub struct ModeTimers {
    landing_since: Option<u32>,
    low_power: RetryGate,
    error_retry: RetryGate,
}

impl ModeTimers {
    pub fn new(timings: &ModeTimings) -> Self {
        Self {
            landing_since: None,
            low_power: RetryGate::new("LowPower", timings.low_power_interval_ms),
            error_retry: RetryGate::new("SensorRecovery", timings.error_retry_interval_ms),
        }
    }

    pub fn landing_since(&self) -> Option<u32> {
        self.landing_since
    }

    fn on_enter(&mut self, mode: OperatingMode, now_ms: u32) {
        match mode {
            OperatingMode::FlightActive => self.landing_since = None,
            OperatingMode::LowPower => self.low_power.arm(now_ms),
            OperatingMode::Error => self.error_retry.arm(now_ms),
            OperatingMode::Initializing | OperatingMode::Ready => {}
        }
    }

    fn on_exit(&mut self, mode: OperatingMode) {
        if mode == OperatingMode::FlightActive {
            self.landing_since = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    NotAttempted,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: OperatingMode,
    pub init: InitOutcome,
}

impl Step {
    fn to(mode: OperatingMode) -> Self {
        Step {
            next: mode,
            init: InitOutcome::NotAttempted,
        }
    }

    fn from_init(result: SensorResult<()>, on_failure: OperatingMode) -> Self {
        match result {
            Ok(()) => Step {
                next: OperatingMode::Ready,
                init: InitOutcome::Succeeded,
            },
            Err(e) => Step {
                next: on_failure,
                init: InitOutcome::Failed(e.to_string()),
            },
        }
    }
}

/// Per-mode rules. Does not apply the health override; see
/// [`OperatingModeMachine::update`].
pub fn transition(
    mode: OperatingMode,
    timers: &mut ModeTimers,
    timings: &ModeTimings,
    signals: &ModeSignals,
    now_ms: u32,
    init: &mut dyn SensorInitializer,
) -> Step {
    match mode {
        OperatingMode::Initializing => {
            Step::from_init(init.initialize_sensors(), OperatingMode::Initializing)
        }
        OperatingMode::Ready => {
            if signals.battery_critical {
                Step::to(OperatingMode::LowPower)
            } else if signals.phase.is_airborne() {
                Step::to(OperatingMode::FlightActive)
            } else {
                Step::to(OperatingMode::Ready)
            }
        }
        OperatingMode::FlightActive => {
            if signals.battery_critical {
                return Step::to(OperatingMode::LowPower);
            }
            if signals.phase.is_on_ground() {
                match timers.landing_since {
                    None => timers.landing_since = Some(now_ms),
                    Some(since) if now_ms.wrapping_sub(since) >= timings.landing_confirmation_ms => {
                        return Step::to(OperatingMode::Ready);
                    }
                    Some(_) => {}
                }
            } else {
                timers.landing_since = None;
            }
            Step::to(OperatingMode::FlightActive)
        }
        OperatingMode::LowPower => {
            if !timers.low_power.fire(now_ms) {
                return Step::to(OperatingMode::LowPower);
            }
            if !signals.battery_critical
                && signals.battery_voltage > timings.low_power_recovery_voltage
            {
                if signals.phase == FlightPhase::Flying {
                    Step::to(OperatingMode::FlightActive)
                } else {
                    Step::to(OperatingMode::Ready)
                }
            } else {
                Step::to(OperatingMode::LowPower)
            }
        }
        OperatingMode::Error => {
            if timers.error_retry.fire(now_ms) {
                Step::from_init(init.initialize_sensors(), OperatingMode::Error)
            } else {
                Step::to(OperatingMode::Error)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: OperatingMode,
    pub to: OperatingMode,
    pub at_ms: u32,
}

pub struct OperatingModeMachine {
    mode: OperatingMode,
    timers: ModeTimers,
    timings: ModeTimings,
    transition_count: u64,
}

impl OperatingModeMachine {
    pub fn new(timings: ModeTimings) -> Self {
        Self {
            mode: OperatingMode::Initializing,
            timers: ModeTimers::new(&timings),
            timings,
            transition_count: 0,
        }
    }

    /// Advance one cycle. A raised health error forces Error before any
    /// per-mode rule runs.
    pub fn update(
        &mut self,
        health: &mut HealthSupervisor,
        signals: &ModeSignals,
        now_ms: u32,
        init: &mut dyn SensorInitializer,
    ) -> Option<ModeTransition> {
        if health.has_error() && self.mode != OperatingMode::Error {
            return self.set_mode(OperatingMode::Error, now_ms);
        }

        let step = transition(self.mode, &mut self.timers, &self.timings, signals, now_ms, init);
        match &step.init {
            InitOutcome::Succeeded => health.clear_error(),
            InitOutcome::Failed(reason) => {
                log::warn!("[MODE] sensor initialization failed: {}", reason);
                health.set_error(reason);
            }
            InitOutcome::NotAttempted => {}
        }

        self.set_mode(step.next, now_ms)
    }

    fn set_mode(&mut self, next: OperatingMode, now_ms: u32) -> Option<ModeTransition> {
        if next == self.mode {
            return None;
        }
        let from = self.mode;
        self.timers.on_exit(from);
        self.mode = next;
        self.timers.on_enter(next, now_ms);
        self.transition_count += 1;
        log::info!("[MODE] {} -> {} at {} ms", from.label(), next.label(), now_ms);
        Some(ModeTransition {
            from,
            to: next,
            at_ms: now_ms,
        })
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn timers(&self) -> &ModeTimers {
        &self.timers
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }
}
