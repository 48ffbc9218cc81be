use crate::types::{AttitudeSample, GpsFix, LogRecord};

/// What the replay hands the flight computer in place of live sensors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReplaySnapshot {
    pub gps: GpsFix,
    pub baro_altitude: f32,
    /// Finite difference of the interpolated baro altitude.
    pub vertical_speed: f32,
    pub attitude: AttitudeSample,
}

/// Plays recorded fixes back against the cycle clock.
///
/// Log time advances one-for-one with wall time from the moment of
/// activation. Between two records every continuous field is linearly
/// interpolated; satellites and HDOP come from the earlier record.
pub struct ReplayEngine {
    records: Vec<LogRecord>,
    cursor: usize,
    active: bool,
    session_start_ms: u32,
    log_start_ms: u32,
    last_update_ms: Option<u32>,
    snapshot: ReplaySnapshot,
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            cursor: 0,
            active: false,
            session_start_ms: 0,
            log_start_ms: 0,
            last_update_ms: None,
            snapshot: ReplaySnapshot::default(),
        }
    }

    /// Start playback at `now_ms`. Returns false (and stays inactive) for an
    /// empty log.
    pub fn activate(&mut self, records: Vec<LogRecord>, now_ms: u32) -> bool {
        let first = match records.first() {
            Some(r) => *r,
            None => {
                log::warn!("[REPLAY] refusing to activate with an empty log");
                self.deactivate();
                return false;
            }
        };

        self.session_start_ms = now_ms;
        self.log_start_ms = first.timestamp;
        self.cursor = 0;
        self.last_update_ms = None;
        self.snapshot = ReplaySnapshot {
            gps: fix_from_record(&first, first.timestamp),
            baro_altitude: first.baro_altitude,
            vertical_speed: 0.0,
            attitude: AttitudeSample::default(),
        };
        self.records = records;
        self.active = true;

        log::info!(
            "[REPLAY] started: {} records spanning {:.1} s",
            self.records.len(),
            self.duration_ms() as f32 / 1000.0
        );
        true
    }

    /// Advance to `now_ms`. No-op once inactive.
    pub fn update(&mut self, now_ms: u32) {
        if !self.active {
            return;
        }

        let target = self.target_log_time(now_ms);
        let last = self.records.len() - 1;
        while self.cursor < last && self.records[self.cursor + 1].timestamp <= target {
            self.cursor += 1;
        }

        if self.cursor >= last {
            self.active = false;
            log::info!("[REPLAY] reached end of log after {} records", self.records.len());
            return;
        }

        let (r0, r1) = (self.records[self.cursor], self.records[self.cursor + 1]);
        let f = fraction(r0.timestamp, r1.timestamp, target);

        let baro_altitude = lerp(r0.baro_altitude, r1.baro_altitude, f);
        let vertical_speed = match self.last_update_ms {
            Some(prev) => {
                let dt_ms = now_ms.wrapping_sub(prev);
                if dt_ms == 0 {
                    0.0
                } else {
                    (baro_altitude - self.snapshot.baro_altitude) / (dt_ms as f32 / 1000.0)
                }
            }
            None => 0.0,
        };

        let gps = GpsFix {
            latitude: r0.latitude + (r1.latitude - r0.latitude) * f as f64,
            longitude: r0.longitude + (r1.longitude - r0.longitude) * f as f64,
            altitude: lerp(r0.gps_altitude, r1.gps_altitude, f),
            speed: lerp(r0.speed, r1.speed, f),
            heading: lerp(r0.heading, r1.heading, f),
            satellites: r0.satellites,
            hdop: r0.hdop,
            timestamp: target,
            has_valid_fix: true,
        };

        self.snapshot = ReplaySnapshot {
            gps,
            baro_altitude,
            vertical_speed,
            attitude: self.snapshot.attitude,
        };
        self.last_update_ms = Some(now_ms);
    }

    pub fn current_snapshot(&self) -> ReplaySnapshot {
        self.snapshot
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop and drop the remaining records.
    pub fn deactivate(&mut self) {
        if self.active {
            log::info!("[REPLAY] stopped at record {}/{}", self.cursor, self.records.len());
        }
        self.active = false;
        self.records.clear();
        self.cursor = 0;
        self.last_update_ms = None;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Log time span from first to last record.
    pub fn duration_ms(&self) -> u32 {
        match (self.records.first(), self.records.last()) {
            (Some(a), Some(b)) => b.timestamp.wrapping_sub(a.timestamp),
            _ => 0,
        }
    }

    fn target_log_time(&self, now_ms: u32) -> u32 {
        self.log_start_ms
            .wrapping_add(now_ms.wrapping_sub(self.session_start_ms))
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn fix_from_record(r: &LogRecord, timestamp: u32) -> GpsFix {
    GpsFix {
        latitude: r.latitude,
        longitude: r.longitude,
        altitude: r.gps_altitude,
        speed: r.speed,
        heading: r.heading,
        satellites: r.satellites,
        hdop: r.hdop,
        timestamp,
        has_valid_fix: true,
    }
}

fn fraction(t0: u32, t1: u32, target: u32) -> f32 {
    if t1 == t0 {
        return 0.0;
    }
    let span = t1.wrapping_sub(t0) as f32;
    let into = target.wrapping_sub(t0) as f32;
    (into / span).clamp(0.0, 1.0)
}

fn lerp(a: f32, b: f32, f: f32) -> f32 {
    a + (b - a) * f
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(t_s: u32, baro: f32, speed: f32) -> LogRecord {
        LogRecord {
            timestamp: 36_000_000 + t_s * 1000,
            latitude: 46.0 + t_s as f64 * 0.001,
            longitude: 7.0,
            gps_altitude: baro + 20.0,
            baro_altitude: baro,
            speed,
            heading: 90.0,
            satellites: 8 + t_s as u8,
            hdop: 1.0 + t_s as f32,
        }
    }

    fn three_records() -> Vec<LogRecord> {
        vec![record(0, 1000.0, 10.0), record(2, 1010.0, 12.0), record(4, 1010.0, 12.0)]
    }

    #[test]
    fn test_empty_log_does_not_activate() {
        let mut replay = ReplayEngine::new();
        assert!(!replay.activate(Vec::new(), 0));
        assert!(!replay.is_active());
    }

    #[test]
    fn test_seeded_from_first_record() {
        let mut replay = ReplayEngine::new();
        assert!(replay.activate(three_records(), 5000));
        let snap = replay.current_snapshot();
        assert_eq!(snap.baro_altitude, 1000.0);
        assert_eq!(snap.gps.timestamp, 36_000_000);
        assert!(snap.gps.has_valid_fix);
        assert_eq!(snap.vertical_speed, 0.0);
    }

    #[test]
    fn test_interpolates_between_records() {
        let mut replay = ReplayEngine::new();
        replay.activate(three_records(), 5000);

        replay.update(6000); // halfway between record 0 and 1
        let snap = replay.current_snapshot();
        assert_relative_eq!(snap.baro_altitude, 1005.0);
        assert_relative_eq!(snap.gps.altitude, 1025.0);
        assert_relative_eq!(snap.gps.speed, 11.0);
        assert_relative_eq!(snap.gps.latitude, 46.001, epsilon = 1e-9);
        assert_eq!(snap.gps.satellites, 8);
        assert_relative_eq!(snap.gps.hdop, 1.0);
        assert_eq!(snap.gps.timestamp, 36_001_000);
        assert_eq!(snap.vertical_speed, 0.0); // first update

        replay.update(6500);
        let snap = replay.current_snapshot();
        assert_relative_eq!(snap.baro_altitude, 1007.5);
        assert_relative_eq!(snap.vertical_speed, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_cursor_advances_and_carries_earlier_record() {
        let mut replay = ReplayEngine::new();
        replay.activate(three_records(), 0);
        replay.update(2000); // exactly on record 1
        assert_eq!(replay.cursor(), 1);
        let snap = replay.current_snapshot();
        assert_relative_eq!(snap.baro_altitude, 1010.0);
        assert_eq!(snap.gps.satellites, 10);
    }

    #[test]
    fn test_end_of_log_deactivates() {
        let mut replay = ReplayEngine::new();
        replay.activate(three_records(), 0);
        replay.update(3000);
        assert!(replay.is_active());
        let before = replay.current_snapshot();

        replay.update(4000);
        assert!(!replay.is_active());
        assert_eq!(replay.current_snapshot(), before);

        replay.update(5000);
        assert_eq!(replay.current_snapshot(), before);
    }

    #[test]
    fn test_single_record_log_ends_on_first_update() {
        let mut replay = ReplayEngine::new();
        assert!(replay.activate(vec![record(0, 500.0, 0.0)], 0));
        replay.update(100);
        assert!(!replay.is_active());
        assert_eq!(replay.current_snapshot().baro_altitude, 500.0);
    }

    #[test]
    fn test_duplicate_timestamps() {
        let mut recs = three_records();
        recs.insert(1, record(0, 2000.0, 0.0));
        assert_eq!(fraction(5, 5, 5), 0.0);

        let mut replay = ReplayEngine::new();
        replay.activate(recs, 0);
        replay.update(500);
        // cursor skipped onto the duplicate, bracketing it with record(2)
        assert_eq!(replay.cursor(), 1);
        assert_relative_eq!(replay.current_snapshot().baro_altitude, 1752.5);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let run = || {
            let mut replay = ReplayEngine::new();
            replay.activate(three_records(), 1_000);
            (0..40)
                .map(|i| {
                    replay.update(1_000 + i * 97);
                    replay.current_snapshot()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_session_across_clock_wrap() {
        let mut replay = ReplayEngine::new();
        replay.activate(three_records(), u32::MAX - 499);
        replay.update(500); // 1000 ms of session time
        assert_relative_eq!(replay.current_snapshot().baro_altitude, 1005.0);
    }

    #[test]
    fn test_deactivate_discards_records() {
        let mut replay = ReplayEngine::new();
        replay.activate(three_records(), 0);
        replay.deactivate();
        assert!(!replay.is_active());
        assert_eq!(replay.record_count(), 0);
        replay.update(1000);
    }
}
