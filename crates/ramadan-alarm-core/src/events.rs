use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;
use crate::resolver::UnarmedReason;

/// Every scheduling decision produces an Event.
/// The service broadcasts them; the CLI daemon prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A timer was armed for the next occurrence.
    AlarmArmed {
        alarm_id: AlarmId,
        fires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The alarm holds no timer.
    AlarmUnarmed {
        alarm_id: AlarmId,
        reason: UnarmedReason,
        at: DateTime<Utc>,
    },
    /// The notification for an occurrence was handed to the sink.
    AlarmDelivered {
        alarm_id: AlarmId,
        occurrence: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The sink refused the notification. The occurrence still counts as
    /// delivered.
    DeliveryFailed {
        alarm_id: AlarmId,
        occurrence: DateTime<Utc>,
        message: String,
        at: DateTime<Utc>,
    },
    /// The occurrence was found more than the grace window late.
    OccurrenceSkipped {
        alarm_id: AlarmId,
        occurrence: DateTime<Utc>,
        late_secs: i64,
        at: DateTime<Utc>,
    },
    AlarmRemoved {
        alarm_id: AlarmId,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn alarm_id(&self) -> &AlarmId {
        match self {
            Event::AlarmArmed { alarm_id, .. }
            | Event::AlarmUnarmed { alarm_id, .. }
            | Event::AlarmDelivered { alarm_id, .. }
            | Event::DeliveryFailed { alarm_id, .. }
            | Event::OccurrenceSkipped { alarm_id, .. }
            | Event::AlarmRemoved { alarm_id, .. } => alarm_id,
        }
    }
}
