use chrono::{DateTime, TimeDelta, Utc};

/// A deadline pinned to its creation time, used for hardware op timeouts.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    start_time: DateTime<Utc>,
    delay: TimeDelta,
}

impl Countdown {
    pub fn new(delta: TimeDelta) -> Self {
        Self {
            start_time: Utc::now(),
            delay: delta,
        }
    }
    pub fn get_end(&self) -> DateTime<Utc> { self.start_time + self.delay }
    pub fn time_left(&self) -> TimeDelta { self.get_end() - Utc::now() }
    pub fn is_lapsed(&self) -> bool { self.time_left() <= TimeDelta::zero() }
}
