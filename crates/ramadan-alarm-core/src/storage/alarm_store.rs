use tracing::{debug, warn};

use super::kv::KeyValueStore;
use crate::alarm::Alarm;
use crate::error::StoreError;

/// Key under which the alarm list is stored.
pub const ALARMS_KEY: &str = "alarms";

/// The persisted alarm list.
///
/// The list is written as one JSON array per save. Loading never fails:
/// missing or unreadable data yields [`Alarm::defaults`].
pub struct AlarmStore {
    kv: Box<dyn KeyValueStore>,
}

impl AlarmStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    pub fn load(&self) -> Vec<Alarm> {
        self.try_load().unwrap_or_else(Alarm::defaults)
    }

    /// The stored list, or `None` when nothing usable has been saved.
    pub fn try_load(&self) -> Option<Vec<Alarm>> {
        let raw = match self.kv.get_item(ALARMS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored alarms, using defaults");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to read alarms, using defaults");
                return None;
            }
        };
        match serde_json::from_str::<Vec<Alarm>>(&raw) {
            Ok(alarms) => Some(alarms),
            Err(e) => {
                warn!(error = %e, "stored alarms are corrupt, using defaults");
                None
            }
        }
    }

    /// Replace the stored list with `alarms`.
    pub fn save_all(&self, alarms: &[Alarm]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(alarms)?;
        self.kv.set_item(ALARMS_KEY, &raw)?;
        debug!(count = alarms.len(), "saved alarms");
        Ok(())
    }
}
