use crate::types::AttitudeSample;

/// Holds the latest IMU attitude for fusion. No filtering happens here.
#[derive(Default)]
pub struct AttitudeTracker {
    current: AttitudeSample,
    samples: u64,
}

impl AttitudeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: AttitudeSample) -> AttitudeSample {
        self.current = sample;
        self.samples += 1;
        self.current
    }

    pub fn current(&self) -> AttitudeSample {
        self.current
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }
}
