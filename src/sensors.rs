use crate::error::{SensorError, SensorResult};
use crate::types::{AttitudeSample, GpsFix};

/// Standard sea-level pressure, hPa.
pub const SEA_LEVEL_HPA: f32 = 1013.25;

// Barometric formula exponent; `altitude_from_pressure` uses its inverse
const BARO_EXPONENT: f32 = 5.255;

// ─── Collaborator capabilities ───────────────────────────────────────────────

pub trait Barometer {
    fn initialize(&mut self) -> SensorResult<()>;
    fn read_pressure(&mut self) -> SensorResult<f32>;
    fn read_temperature(&mut self) -> SensorResult<f32>;

    /// International barometric formula, meters above the `sea_level_hpa`
    /// reference.
    fn altitude_from_pressure(&self, pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
        44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(1.0 / BARO_EXPONENT))
    }
}

pub trait Gps {
    fn initialize(&mut self) -> SensorResult<()>;
    /// Poll the receiver; called once per cycle before `current_fix`.
    fn update(&mut self);
    fn current_fix(&self) -> GpsFix;
}

pub trait Imu {
    fn initialize(&mut self) -> SensorResult<()>;
    fn current_attitude(&mut self) -> AttitudeSample;
}

pub trait Power {
    fn battery_voltage(&mut self) -> f32;
    fn is_charging(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Startup,
    Shutdown,
    GpsFix,
    Error,
    LowBattery,
}

pub trait Audio {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32);
    fn no_tone(&mut self);
    fn play_alert(&mut self, alert: AlertKind);
}

/// Milliseconds since boot; wraps at 2^32.
pub trait Clock {
    fn now_millis(&self) -> u32;
}

/// The collaborators one cycle talks to, borrowed from the caller.
pub struct Hardware<'a> {
    pub barometer: &'a mut dyn Barometer,
    pub gps: &'a mut dyn Gps,
    pub imu: &'a mut dyn Imu,
    pub power: &'a mut dyn Power,
    pub audio: &'a mut dyn Audio,
}

impl<'a> Hardware<'a> {
    /// Barometer, then GPS, then IMU. Stops at the first failure.
    pub fn initialize_sensors(&mut self) -> SensorResult<()> {
        self.barometer.initialize()?;
        self.gps.initialize()?;
        self.imu.initialize()?;
        log::debug!("[SENSORS] barometer, gps and imu initialized");
        Ok(())
    }
}

// ─── Bench implementations ───────────────────────────────────────────────────

/// Fixed-pressure barometer for bench runs and replay.
#[derive(Clone, Debug)]
pub struct BenchBarometer {
    pub pressure_hpa: f32,
    pub temperature_c: f32,
    pub fail_init: bool,
    pub fail_reads: bool,
    pub init_calls: u32,
}

impl BenchBarometer {
    pub fn new(pressure_hpa: f32, temperature_c: f32) -> Self {
        Self {
            pressure_hpa,
            temperature_c,
            fail_init: false,
            fail_reads: false,
            init_calls: 0,
        }
    }

    /// Pressure that reads back as `altitude_m` against `sea_level_hpa`.
    pub fn at_altitude(altitude_m: f32, sea_level_hpa: f32) -> Self {
        let pressure = sea_level_hpa * (1.0 - altitude_m / 44330.0).powf(BARO_EXPONENT);
        Self::new(pressure, 15.0)
    }
}

impl Default for BenchBarometer {
    fn default() -> Self {
        Self::new(SEA_LEVEL_HPA, 15.0)
    }
}

impl Barometer for BenchBarometer {
    fn initialize(&mut self) -> SensorResult<()> {
        self.init_calls += 1;
        if self.fail_init {
            return Err(SensorError::InitFailed("barometer".into()));
        }
        Ok(())
    }

    fn read_pressure(&mut self) -> SensorResult<f32> {
        if self.fail_reads {
            return Err(SensorError::ReadFailed("barometer pressure".into()));
        }
        Ok(self.pressure_hpa)
    }

    fn read_temperature(&mut self) -> SensorResult<f32> {
        if self.fail_reads {
            return Err(SensorError::ReadFailed("barometer temperature".into()));
        }
        Ok(self.temperature_c)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BenchGps {
    pub fix: GpsFix,
    pub fail_init: bool,
    pub polls: u64,
}

impl BenchGps {
    pub fn with_fix(fix: GpsFix) -> Self {
        Self {
            fix,
            ..Self::default()
        }
    }
}

impl Gps for BenchGps {
    fn initialize(&mut self) -> SensorResult<()> {
        if self.fail_init {
            return Err(SensorError::NotResponding("gps".into()));
        }
        Ok(())
    }

    fn update(&mut self) {
        self.polls += 1;
    }

    fn current_fix(&self) -> GpsFix {
        self.fix
    }
}

#[derive(Clone, Debug, Default)]
pub struct BenchImu {
    pub attitude: AttitudeSample,
    pub fail_init: bool,
}

impl Imu for BenchImu {
    fn initialize(&mut self) -> SensorResult<()> {
        if self.fail_init {
            return Err(SensorError::InitFailed("imu".into()));
        }
        Ok(())
    }

    fn current_attitude(&mut self) -> AttitudeSample {
        self.attitude
    }
}

#[derive(Clone, Debug)]
pub struct BenchPower {
    pub voltage: f32,
    pub charging: bool,
}

impl BenchPower {
    pub fn new(voltage: f32) -> Self {
        Self {
            voltage,
            charging: false,
        }
    }
}

impl Power for BenchPower {
    fn battery_voltage(&mut self) -> f32 {
        self.voltage
    }

    fn is_charging(&mut self) -> bool {
        self.charging
    }
}

/// Records what would have been played.
#[derive(Clone, Debug, Default)]
pub struct SilentAudio {
    pub last_tone: Option<(u32, u32)>,
    pub tones: u64,
    pub silences: u64,
    pub alerts: Vec<AlertKind>,
}

impl Audio for SilentAudio {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        self.last_tone = Some((freq_hz, duration_ms));
        self.tones += 1;
    }

    fn no_tone(&mut self) {
        self.last_tone = None;
        self.silences += 1;
    }

    fn play_alert(&mut self, alert: AlertKind) {
        self.alerts.push(alert);
    }
}

/// Clock driven by the caller.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: std::cell::Cell<u32>,
}

impl ManualClock {
    pub fn starting_at(now_ms: u32) -> Self {
        Self {
            now_ms: std::cell::Cell::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u32) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u32) {
        self.now_ms.set(self.now_ms.get().wrapping_add(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u32 {
        self.now_ms.get()
    }
}

/// Wall clock measured from construction.
pub struct MonotonicClock {
    start: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u32 {
        // truncation is the wrap
        self.start.elapsed().as_millis() as u32
    }
}
