//! Notification delivery boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alarm::{Alarm, AlarmId, AlarmKind};
use crate::error::DeliveryError;
use crate::ringtone;

/// What the user sees and hears when an alarm goes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub alarm_id: AlarmId,
    pub title: String,
    pub body: String,
    /// As stored on the alarm; may be unknown to the registry.
    pub ringtone_id: String,
    /// Always a registry file.
    pub sound_file: String,
    /// The occurrence instant, not the delivery instant.
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn for_alarm(alarm: &Alarm, at: DateTime<Utc>) -> Self {
        let body = match alarm.kind {
            AlarmKind::Sehri => "Time for Sehri. Fajr is approaching.".to_string(),
            AlarmKind::Iftar => "It's time to break your fast.".to_string(),
            AlarmKind::Custom => format!("Alarm for {}", alarm.time),
        };
        Self {
            alarm_id: alarm.id.clone(),
            title: alarm.title().to_string(),
            body,
            ringtone_id: alarm.ringtone.clone(),
            sound_file: ringtone::file(&alarm.ringtone).to_string(),
            at,
        }
    }
}

/// Shows a notification and plays its sound.
///
/// Called from the scheduler's task; implementations should hand off quickly.
pub trait NotificationSink: Send {
    fn show(&mut self, notification: &Notification) -> Result<(), DeliveryError>;
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn show(&mut self, notification: &Notification) -> Result<(), DeliveryError> {
        (**self).show(notification)
    }
}

/// Logs each alert instead of showing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show(&mut self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            alarm_id = %notification.alarm_id,
            title = %notification.title,
            sound = %notification.sound_file,
            at = %notification.at,
            "alarm"
        );
        Ok(())
    }
}

/// Records notifications in memory. Useful for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    shown: std::sync::Arc<std::sync::Mutex<Vec<Notification>>>,
    fail_with: Option<DeliveryError>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every attempt but reports `err`.
    pub fn failing(err: DeliveryError) -> Self {
        Self {
            shown: Default::default(),
            fail_with: Some(err),
        }
    }

    /// Snapshot of everything shown so far. Clones share the same log.
    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&mut self, notification: &Notification) -> Result<(), DeliveryError> {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(notification.clone());
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
