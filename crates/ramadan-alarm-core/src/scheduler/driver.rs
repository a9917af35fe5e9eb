use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;

/// Identity of one armed occurrence.
///
/// Every arm gets a fresh token; a fire carrying any other token is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArmToken(pub u64);

impl fmt::Display for ArmToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Platform timers.
///
/// `arm` replaces any timer already held for the id. When a timer expires
/// the driver must call back `Scheduler::fire(id, token, now)`.
pub trait TimerDriver: Send {
    fn arm(&mut self, id: &AlarmId, token: ArmToken, delay: Duration);
    fn disarm(&mut self, id: &AlarmId);
}

/// Records armed timers without ever firing them; tests fire by hand.
#[derive(Debug, Default, Clone)]
pub struct ManualTimers {
    armed: Arc<Mutex<HashMap<AlarmId, (ArmToken, Duration)>>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token and delay of the timer held for `id`.
    pub fn get(&self, id: &AlarmId) -> Option<(ArmToken, Duration)> {
        self.armed.lock().ok()?.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.armed.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimerDriver for ManualTimers {
    fn arm(&mut self, id: &AlarmId, token: ArmToken, delay: Duration) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(id.clone(), (token, delay));
        }
    }

    fn disarm(&mut self, id: &AlarmId) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.remove(id);
        }
    }
}
