//! Discovery cadence driven by a caller-supplied clock

/// Decides when the next discovery pass is due
#[derive(Debug, Clone)]
pub struct PollCadence {
    interval: f64,
    last: Option<f64>,
}

impl PollCadence {
    /// Create a cadence firing every `interval_secs` seconds
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval: interval_secs,
            last: None,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn set_interval(&mut self, interval_secs: f64) {
        self.interval = interval_secs;
    }

    /// Check whether a poll is due at `now` (seconds) and record it if so
    ///
    /// The first call always polls. A clock that went backwards restarts the
    /// interval from `now`.
    pub fn should_poll(&mut self, now: f64) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                true
            }
            Some(last) if last > now => {
                self.last = Some(now);
                false
            }
            Some(last) if now - last >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
