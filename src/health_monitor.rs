use serde::{Deserialize, Serialize};

use crate::retry_gate::RetryGate;
use crate::types::FlightSnapshot;

pub const STALE_DATA_ERROR: &str = "Sensor data stale";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub check_interval_ms: u32,
    pub stale_limit: u8,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 1000,
            stale_limit: 5,
        }
    }
}

/// Watches fused snapshots for a frozen timestamp and raises a fault.
pub struct HealthSupervisor {
    last_error: String,
    stale_count: u8,
    stale_limit: u8,
    last_seen_timestamp: u32,
    check_gate: RetryGate,
}

impl HealthSupervisor {
    pub fn new(config: &HealthConfig) -> Self {
        HealthSupervisor {
            last_error: String::new(),
            stale_count: 0,
            stale_limit: config.stale_limit.max(1),
            last_seen_timestamp: 0,
            check_gate: RetryGate::new("Health", config.check_interval_ms),
        }
    }

    /// Self-throttled: calls inside the check interval do nothing.
    pub fn check(&mut self, snapshot: &FlightSnapshot, now_ms: u32) {
        if !self.check_gate.fire(now_ms) {
            return;
        }

        let ts = snapshot.timestamp;
        if ts == self.last_seen_timestamp && ts != 0 {
            if self.stale_count < self.stale_limit {
                self.stale_count += 1;
                if self.stale_count >= self.stale_limit {
                    log::warn!(
                        "[HEALTH] snapshot timestamp frozen at {} ms for {} checks",
                        ts,
                        self.stale_count
                    );
                    self.set_error(STALE_DATA_ERROR);
                }
            }
        } else {
            self.stale_count = 0;
            if self.last_error == STALE_DATA_ERROR {
                log::info!("[HEALTH] sensor data flowing again, clearing stale error");
                self.last_error.clear();
            }
            self.last_seen_timestamp = ts;
        }
    }

    pub fn has_error(&self) -> bool {
        !self.last_error.is_empty()
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn set_error(&mut self, error: &str) {
        if self.last_error != error {
            log::warn!("[HEALTH] error raised: {}", error);
        }
        self.last_error = error.to_string();
    }

    pub fn clear_error(&mut self) {
        if self.has_error() {
            log::info!("[HEALTH] error cleared: {}", self.last_error);
        }
        self.last_error.clear();
        self.stale_count = 0;
    }

    pub fn stale_count(&self) -> u8 {
        self.stale_count
    }

    pub fn last_seen_timestamp(&self) -> u32 {
        self.last_seen_timestamp
    }

    pub fn format_status(&self) -> String {
        if self.has_error() {
            format!("Health: ⚠ {} (stale {}/{})", self.last_error, self.stale_count, self.stale_limit)
        } else {
            format!("Health: ✓ (stale {}/{})", self.stale_count, self.stale_limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(timestamp: u32) -> FlightSnapshot {
        FlightSnapshot {
            timestamp,
            ..FlightSnapshot::default()
        }
    }

    #[test]
    fn test_stale_error_on_fifth_frozen_check() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        health.check(&snap(1000), 1000);
        assert!(!health.has_error());

        for i in 1..=5u32 {
            health.check(&snap(1000), 1000 + i * 1000);
            if i < 5 {
                assert!(!health.has_error(), "error too early on check {}", i);
            }
        }
        assert!(health.has_error());
        assert_eq!(health.last_error(), STALE_DATA_ERROR);
        assert_eq!(health.stale_count(), 5);
    }

    #[test]
    fn test_counter_caps_at_limit() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        health.check(&snap(1000), 1000);
        for i in 1..=20u32 {
            health.check(&snap(1000), 1000 + i * 1000);
        }
        assert_eq!(health.stale_count(), 5);
    }

    #[test]
    fn test_checks_inside_interval_are_noops() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        health.check(&snap(1000), 1000);
        for t in (1100..2000).step_by(100) {
            health.check(&snap(1000), t);
        }
        assert_eq!(health.stale_count(), 0);
        health.check(&snap(1000), 2000);
        assert_eq!(health.stale_count(), 1);
    }

    #[test]
    fn test_zero_timestamp_never_counts() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        for i in 1..=10u32 {
            health.check(&snap(0), i * 1000);
        }
        assert!(!health.has_error());
        assert_eq!(health.stale_count(), 0);
    }

    #[test]
    fn test_advancing_timestamp_clears_stale_error() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        health.check(&snap(1000), 1000);
        for i in 1..=5u32 {
            health.check(&snap(1000), 1000 + i * 1000);
        }
        assert!(health.has_error());

        health.check(&snap(7000), 7000);
        assert!(!health.has_error());
        assert_eq!(health.stale_count(), 0);
    }

    #[test]
    fn test_advancing_timestamp_keeps_other_errors() {
        let mut health = HealthSupervisor::new(&HealthConfig::default());
        health.set_error("Sensor init failed: baro");
        health.check(&snap(1000), 1000);
        health.check(&snap(2000), 2000);
        assert_eq!(health.last_error(), "Sensor init failed: baro");

        health.clear_error();
        assert!(!health.has_error());
        assert!(health.format_status().contains("✓"));
    }
}
