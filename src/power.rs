use serde::{Deserialize, Serialize};

use crate::retry_gate::RetryGate;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub low_battery_alert_interval_ms: u32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            low_battery_alert_interval_ms: 5000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryLevel {
    Ok,
    Low,
    Critical,
}

/// What the audio collaborator should announce this cycle, if anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerAlert {
    LowBattery,
    Critical,
}

/// Classifies battery voltage against the configured warning levels.
pub struct PowerMonitor {
    voltage: f32,
    charging: bool,
    low_warning: f32,
    critical_level: f32,
    alert_gate: RetryGate,
}

impl PowerMonitor {
    pub fn new(low_warning: f32, critical_level: f32, config: &PowerConfig) -> Self {
        Self {
            voltage: 0.0,
            charging: false,
            low_warning,
            critical_level,
            alert_gate: RetryGate::new("LowBattery", config.low_battery_alert_interval_ms),
        }
    }

    pub fn update(&mut self, voltage: f32, charging: bool, now_ms: u32) -> Option<PowerAlert> {
        let before = self.level();
        self.voltage = voltage;
        self.charging = charging;
        let level = self.level();

        if level != before {
            match level {
                BatteryLevel::Critical => log::warn!("[POWER] battery critical at {:.2} V", voltage),
                BatteryLevel::Low => log::warn!("[POWER] battery low at {:.2} V", voltage),
                BatteryLevel::Ok => log::info!("[POWER] battery ok at {:.2} V", voltage),
            }
        }

        match level {
            BatteryLevel::Critical => Some(PowerAlert::Critical),
            BatteryLevel::Low if self.alert_gate.fire(now_ms) => Some(PowerAlert::LowBattery),
            _ => None,
        }
    }

    pub fn level(&self) -> BatteryLevel {
        if self.is_critical() {
            BatteryLevel::Critical
        } else if self.is_low() {
            BatteryLevel::Low
        } else {
            BatteryLevel::Ok
        }
    }

    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn is_low(&self) -> bool {
        self.voltage < self.low_warning
    }

    pub fn is_critical(&self) -> bool {
        self.voltage < self.critical_level
    }
}
