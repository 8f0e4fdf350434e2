use chrono::{DateTime, FixedOffset, TimeDelta};
use parking_lot::Mutex;

/// Access to the outside world: the clock used for commit and tag timestamps
pub trait Platform: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPlatform;

impl Platform for SystemPlatform {
    fn now(&self) -> DateTime<FixedOffset> {
        chrono::Local::now().fixed_offset()
    }
}

/// Deterministic clock: returns `start` and moves forward by `step` on each call
#[derive(Debug)]
pub struct FixedPlatform {
    current: Mutex<DateTime<FixedOffset>>,
    step: TimeDelta,
}

impl FixedPlatform {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        FixedPlatform {
            current: Mutex::new(start),
            step: TimeDelta::zero(),
        }
    }

    pub fn ticking(start: DateTime<FixedOffset>, step: TimeDelta) -> Self {
        FixedPlatform {
            current: Mutex::new(start),
            step,
        }
    }
}

impl Platform for FixedPlatform {
    fn now(&self) -> DateTime<FixedOffset> {
        let mut current = self.current.lock();
        let now = *current;
        *current = now + self.step;
        now
    }
}
