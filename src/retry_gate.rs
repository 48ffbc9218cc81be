/// Wall-clock interval gate.
///
/// Nothing runs in the background: callers ask `is_due(now)` on their own
/// cycle and `fire(now)` when they act. All arithmetic wraps with the u32
/// millisecond clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryGate {
    pub name: &'static str,
    pub interval_ms: u32,
    last_ms: u32,
    attempts: u32,
}

impl RetryGate {
    pub fn new(name: &'static str, interval_ms: u32) -> Self {
        RetryGate {
            name,
            interval_ms,
            last_ms: 0,
            attempts: 0,
        }
    }

    /// Start a fresh interval at `now_ms` (state entry).
    pub fn arm(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
        self.attempts = 0;
    }

    pub fn elapsed(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.last_ms)
    }

    pub fn is_due(&self, now_ms: u32) -> bool {
        self.elapsed(now_ms) >= self.interval_ms
    }

    /// Returns true (and restarts the interval) when due.
    pub fn fire(&mut self, now_ms: u32) -> bool {
        if !self.is_due(now_ms) {
            return false;
        }
        self.last_ms = now_ms;
        self.attempts = self.attempts.saturating_add(1);
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.last_ms = 0;
        self.attempts = 0;
    }

    pub fn status(&self, now_ms: u32) -> String {
        if self.is_due(now_ms) {
            format!("{}: DUE (attempt {})", self.name, self.attempts + 1)
        } else {
            format!(
                "{}: WAITING ({} ms left, {} attempt(s))",
                self.name,
                self.interval_ms - self.elapsed(now_ms),
                self.attempts
            )
        }
    }
}
