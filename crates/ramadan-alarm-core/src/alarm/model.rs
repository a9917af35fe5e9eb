use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::day::{Day, TimeOfDay};
use crate::error::ValidationError;
use crate::ringtone::DEFAULT_RINGTONE_ID;

/// Longest label accepted by `Alarm::validate`.
pub const MAX_LABEL_LEN: usize = 128;

/// Opaque alarm identifier, stable across persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(String);

impl AlarmId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a newly created alarm.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlarmId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    /// Fires before dawn, derived from Fajr.
    Sehri,
    /// Fires at sunset, equal to Maghrib.
    Iftar,
    /// Fires at the stored time of day; never consults prayer times.
    Custom,
}

impl AlarmKind {
    /// Whether the firing time comes from the daily event provider.
    pub fn uses_daily_events(self) -> bool {
        matches!(self, AlarmKind::Sehri | AlarmKind::Iftar)
    }

    pub fn default_title(self) -> &'static str {
        match self {
            AlarmKind::Sehri => "Sehri Time",
            AlarmKind::Iftar => "Iftar Time",
            AlarmKind::Custom => "Alarm",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlarmKind::Sehri => "sehri",
            AlarmKind::Iftar => "iftar",
            AlarmKind::Custom => "custom",
        }
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sehri" => Ok(AlarmKind::Sehri),
            "iftar" => Ok(AlarmKind::Iftar),
            "custom" => Ok(AlarmKind::Custom),
            _ => Err(ValidationError::InvalidKind(s.to_string())),
        }
    }
}

fn default_ringtone_id() -> String {
    DEFAULT_RINGTONE_ID.to_string()
}

/// A user-defined recurring alarm.
///
/// Field order matches the persisted layout
/// `{id, time, label, type, active, days, ringtone}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    /// Authoritative for `custom`; a cached display value for sehri/iftar.
    pub time: TimeOfDay,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: AlarmKind,
    pub active: bool,
    pub days: Vec<Day>,
    #[serde(default = "default_ringtone_id")]
    pub ringtone: String,
}

impl Alarm {
    /// A new active every-day alarm of the given kind.
    pub fn new(kind: AlarmKind, time: TimeOfDay, label: impl Into<String>) -> Self {
        Self {
            id: AlarmId::generate(),
            time,
            label: label.into(),
            kind,
            active: true,
            days: Day::ALL.to_vec(),
            ringtone: default_ringtone_id(),
        }
    }

    /// The set used when nothing has been persisted yet.
    pub fn defaults() -> Vec<Alarm> {
        vec![
            Alarm {
                id: AlarmId::new("1"),
                time: TimeOfDay::literal(4, 30),
                label: AlarmKind::Sehri.default_title().to_string(),
                kind: AlarmKind::Sehri,
                active: true,
                days: Day::ALL.to_vec(),
                ringtone: default_ringtone_id(),
            },
            Alarm {
                id: AlarmId::new("2"),
                time: TimeOfDay::literal(18, 45),
                label: AlarmKind::Iftar.default_title().to_string(),
                kind: AlarmKind::Iftar,
                active: true,
                days: Day::ALL.to_vec(),
                ringtone: default_ringtone_id(),
            },
        ]
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Day>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    pub fn with_id(mut self, id: impl Into<AlarmId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ringtone(mut self, ringtone: impl Into<String>) -> Self {
        self.ringtone = ringtone.into();
        self
    }

    /// Structural checks. An empty `days` list is not an error here: such an
    /// alarm is stored and simply never fires.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        let len = self.label.chars().count();
        if len > MAX_LABEL_LEN {
            return Err(ValidationError::LabelTooLong {
                len,
                max: MAX_LABEL_LEN,
            });
        }
        Ok(())
    }

    pub fn fires_on(&self, weekday: Weekday) -> bool {
        self.days.iter().any(|d| d.weekday() == weekday)
    }

    /// Notification title: the label, or the kind's default when blank.
    pub fn title(&self) -> &str {
        if self.label.trim().is_empty() {
            self.kind.default_title()
        } else {
            &self.label
        }
    }

    /// Human-readable repeat description, e.g. "Every day" or "Mon, Fri".
    pub fn repeat_summary(&self) -> String {
        if Day::ALL.iter().all(|d| self.days.contains(d)) {
            return "Every day".to_string();
        }
        if self.days.is_empty() {
            return "Never".to_string();
        }
        self.days
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<String> for AlarmId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
