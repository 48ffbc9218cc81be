use serde::{Deserialize, Serialize};

/// How vertical speed is derived from consecutive altitude estimates.
///
/// `PreviousSpeedBaseline` reproduces the shipped vario: it subtracts the
/// previous *vertical speed* from the new altitude before dividing by dt.
/// Audio thresholds in the field were tuned against that output, so it stays
/// the default until the owner signs off on `PreviousAltitudeBaseline`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalSpeedFormula {
    #[default]
    PreviousSpeedBaseline,
    PreviousAltitudeBaseline,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AltitudeConfig {
    pub process_noise: f32,
    pub measurement_noise: f32,
    pub initial_covariance: f32,
    pub vertical_speed_formula: VerticalSpeedFormula,
    pub lift_threshold: f32, // m/s
    pub sink_threshold: f32, // m/s
    pub tone_duration_ms: u32,
}

impl Default for AltitudeConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.00001,
            measurement_noise: 0.01,
            initial_covariance: 1.0,
            vertical_speed_formula: VerticalSpeedFormula::PreviousSpeedBaseline,
            lift_threshold: 0.5,
            sink_threshold: -0.5,
            tone_duration_ms: 100,
        }
    }
}

/// Scalar Kalman state for barometric altitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanState {
    pub x: f32, // altitude estimate
    pub p: f32, // error covariance
    pub q: f32, // process noise
    pub r: f32, // measurement noise
    pub k: f32, // last gain
}

/// Audio intent derived from vertical speed. Playing it is the audio
/// collaborator's job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarioCue {
    Lift { freq_hz: u32 },
    Sink { freq_hz: u32 },
    Quiet,
}

impl VarioCue {
    pub fn from_vertical_speed(vertical_speed: f32, config: &AltitudeConfig) -> Self {
        // `as` saturates, so strong sink bottoms out at 0 Hz
        if vertical_speed > config.lift_threshold {
            VarioCue::Lift {
                freq_hz: (1000.0 + vertical_speed * 100.0) as u32,
            }
        } else if vertical_speed < config.sink_threshold {
            VarioCue::Sink {
                freq_hz: (500.0 + vertical_speed * 50.0) as u32,
            }
        } else {
            VarioCue::Quiet
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AltitudeEstimate {
    pub altitude: f32,
    pub vertical_speed: f32,
    pub cue: VarioCue,
}

pub struct AltitudeEstimator {
    state: KalmanState,
    vertical_speed: f32,
    formula: VerticalSpeedFormula,
    config: AltitudeConfig,
    update_count: u64,
}

impl AltitudeEstimator {
    pub fn new(config: AltitudeConfig) -> Self {
        Self::with_initial_altitude(config, 0.0)
    }

    pub fn with_initial_altitude(config: AltitudeConfig, initial_altitude: f32) -> Self {
        Self {
            state: KalmanState {
                x: initial_altitude,
                p: config.initial_covariance.max(0.0),
                q: config.process_noise,
                r: config.measurement_noise,
                k: 0.0,
            },
            vertical_speed: 0.0,
            formula: config.vertical_speed_formula,
            config,
            update_count: 0,
        }
    }

    /// Run one predict/correct step.
    ///
    /// `raw_altitude` is `None` when the barometer read failed; the previous
    /// estimate stands in as the measurement. A non-positive `dt_seconds`
    /// leaves the filter untouched and returns the previous estimate.
    pub fn update(&mut self, raw_altitude: Option<f32>, dt_seconds: f32) -> AltitudeEstimate {
        if !(dt_seconds > 0.0) {
            return self.estimate();
        }

        // A non-finite reading counts as missing
        let measurement = raw_altitude
            .filter(|a| a.is_finite())
            .unwrap_or(self.state.x);
        let previous_altitude = self.state.x;
        let s = &mut self.state;

        // Predict
        s.p += s.q;

        // Correct
        s.k = s.p / (s.p + s.r);
        s.x += s.k * (measurement - s.x);
        s.p = ((1.0 - s.k) * s.p).max(0.0);

        self.vertical_speed = match self.formula {
            VerticalSpeedFormula::PreviousSpeedBaseline => {
                (s.x - self.vertical_speed) / dt_seconds
            }
            VerticalSpeedFormula::PreviousAltitudeBaseline => {
                (s.x - previous_altitude) / dt_seconds
            }
        };
        self.update_count += 1;

        self.estimate()
    }

    pub fn estimate(&self) -> AltitudeEstimate {
        AltitudeEstimate {
            altitude: self.state.x,
            vertical_speed: self.vertical_speed,
            cue: VarioCue::from_vertical_speed(self.vertical_speed, &self.config),
        }
    }

    pub fn altitude(&self) -> f32 {
        self.state.x
    }

    pub fn vertical_speed(&self) -> f32 {
        self.vertical_speed
    }

    pub fn kalman_state(&self) -> KalmanState {
        self.state
    }

    pub fn formula(&self) -> VerticalSpeedFormula {
        self.formula
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Re-seed the estimate, e.g. from the first barometer read.
    pub fn seed(&mut self, altitude: f32) {
        self.state.x = altitude;
        self.vertical_speed = 0.0;
    }
}
