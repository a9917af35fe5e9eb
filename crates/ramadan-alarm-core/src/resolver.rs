//! Next-occurrence resolution.
//!
//! Given an alarm and "now", find the earliest instant strictly after now at
//! which the alarm must fire. Candidate dates are today and the following
//! seven days (one full week plus a guard day), enumerated in increasing
//! order; the first hit wins.
//!
//! - `custom` alarms combine each eligible date with their stored time of day.
//! - `sehri` alarms ask the provider for Fajr and subtract the sehri offset.
//! - `iftar` alarms ask the provider for Maghrib.
//!
//! A provider failure on a candidate date stops the search. Consulting later
//! dates past a failed one could skip the real next occurrence.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::alarm::{Alarm, AlarmKind};
use crate::error::ProviderError;
use crate::prayer::{Coordinates, EventTimeProvider, FAJR, MAGHRIB};

/// Candidate dates considered: today plus seven days.
pub const SEARCH_WINDOW_DAYS: u64 = 8;

/// Sehri ends this many minutes before Fajr unless configured otherwise.
pub const DEFAULT_SEHRI_OFFSET_MINUTES: i64 = 10;

/// Why an alarm has no armed occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnarmedReason {
    /// The alarm is switched off.
    Inactive,
    /// No weekday in the search window is enabled (e.g. empty `days`).
    NoEligibleDay,
    /// Prayer times could not be obtained; retried on the next resume or
    /// coordinates change.
    ProviderUnavailable,
}

/// Outcome of [`OccurrenceResolver::resolve_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    At(DateTime<Utc>),
    Unresolved(UnarmedReason),
}

impl Resolution {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Resolution::At(at) => Some(*at),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// Sehri and iftar instants of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamadanDay {
    pub date: NaiveDate,
    pub sehri: DateTime<Utc>,
    pub iftar: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceResolver {
    sehri_offset: Duration,
}

impl Default for OccurrenceResolver {
    fn default() -> Self {
        Self {
            sehri_offset: Duration::minutes(DEFAULT_SEHRI_OFFSET_MINUTES),
        }
    }
}

impl OccurrenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sehri_offset(sehri_offset: Duration) -> Self {
        Self { sehri_offset }
    }

    pub fn sehri_offset(&self) -> Duration {
        self.sehri_offset
    }

    /// Earliest instant strictly after `now` at which `alarm` fires.
    ///
    /// Dates are taken in `now`'s timezone, so a timezone change is picked up
    /// by resolving again with the new `now`.
    pub fn resolve_next<Tz: TimeZone>(
        &self,
        alarm: &Alarm,
        now: &DateTime<Tz>,
        coordinates: Coordinates,
        provider: &dyn EventTimeProvider,
    ) -> Resolution {
        if !alarm.active {
            return Resolution::Unresolved(UnarmedReason::Inactive);
        }

        let zone = now.timezone();
        let now_utc = now.with_timezone(&Utc);
        let today = now.date_naive();

        for offset in 0..SEARCH_WINDOW_DAYS {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            if !alarm.fires_on(date.weekday()) {
                continue;
            }

            let candidate = match alarm.kind {
                AlarmKind::Custom => {
                    let naive = date.and_time(alarm.time.to_naive_time());
                    // Skip dates where the time falls into a DST gap.
                    match zone.from_local_datetime(&naive).earliest() {
                        Some(local) => local.with_timezone(&Utc),
                        None => continue,
                    }
                }
                kind => match self.event_instant(kind, date, coordinates, provider) {
                    Ok(at) => at,
                    Err(err) => {
                        warn!(alarm_id = %alarm.id, %date, error = %err, "cannot resolve occurrence");
                        return Resolution::Unresolved(UnarmedReason::ProviderUnavailable);
                    }
                },
            };

            if candidate > now_utc {
                return Resolution::At(candidate);
            }
        }

        Resolution::Unresolved(UnarmedReason::NoEligibleDay)
    }

    /// Sehri or iftar instant of `date`. Custom alarms have none.
    pub fn event_instant(
        &self,
        kind: AlarmKind,
        date: NaiveDate,
        coordinates: Coordinates,
        provider: &dyn EventTimeProvider,
    ) -> Result<DateTime<Utc>, ProviderError> {
        match kind {
            AlarmKind::Sehri => Ok(provider.event(date, coordinates, FAJR)? - self.sehri_offset),
            AlarmKind::Iftar => provider.event(date, coordinates, MAGHRIB),
            AlarmKind::Custom => Err(ProviderError::MissingEvent {
                date,
                name: "custom".to_string(),
            }),
        }
    }

    /// Sehri and iftar for `days` consecutive dates starting at `from`.
    pub fn upcoming_times(
        &self,
        from: NaiveDate,
        days: u32,
        coordinates: Coordinates,
        provider: &dyn EventTimeProvider,
    ) -> Result<Vec<RamadanDay>, ProviderError> {
        (0..u64::from(days))
            .filter_map(|i| from.checked_add_days(Days::new(i)))
            .map(|date| {
                Ok(RamadanDay {
                    date,
                    sehri: self.event_instant(AlarmKind::Sehri, date, coordinates, provider)?,
                    iftar: self.event_instant(AlarmKind::Iftar, date, coordinates, provider)?,
                })
            })
            .collect()
    }
}
