use std::sync::Mutex;

use chrono::{DateTime, Duration, Local};

/// Source of wall-clock time for the scheduler.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A wall clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Wall clock driven by tokio's monotonic clock.
///
/// Reads `base + elapsed + skew`, where `elapsed` is measured with
/// `tokio::time::Instant`. Under a paused runtime this follows
/// `tokio::time::advance`, and `jump` simulates the user changing the clock
/// or the machine sleeping.
#[derive(Debug)]
pub struct SimulatedClock {
    base: DateTime<Local>,
    start: tokio::time::Instant,
    skew: Mutex<Duration>,
}

impl SimulatedClock {
    pub fn new(base: DateTime<Local>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
            skew: Mutex::new(Duration::zero()),
        }
    }

    /// Move the wall clock without moving the monotonic clock.
    pub fn jump(&self, by: Duration) {
        if let Ok(mut skew) = self.skew.lock() {
            *skew += by;
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = Duration::from_std(self.start.elapsed()).unwrap_or_else(|_| Duration::zero());
        let skew = self.skew.lock().map(|s| *s).unwrap_or_else(|_| Duration::zero());
        self.base + elapsed + skew
    }
}
