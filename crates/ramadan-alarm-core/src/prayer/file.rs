use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, NaiveDate, TimeZone};

use super::provider::{Coordinates, DailyEvent, EventTimeProvider};
use super::timetable::local_instant;
use crate::alarm::TimeOfDay;
use crate::error::{CoreError, ProviderError};

/// Per-date prayer times read from a JSON document, e.g. a published
/// Ramadan calendar:
///
/// ```json
/// { "2025-03-01": { "Fajr": "05:02", "Maghrib": "18:21" } }
/// ```
///
/// Times are local wall-clock times of `zone`. Dates absent from the
/// document are reported as unavailable.
#[derive(Debug, Clone)]
pub struct TimetableFile<Tz: TimeZone = Local> {
    zone: Tz,
    days: BTreeMap<NaiveDate, BTreeMap<String, TimeOfDay>>,
}

impl TimetableFile<Local> {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(Local, &raw)
    }
}

impl<Tz: TimeZone> TimetableFile<Tz> {
    pub fn from_json(zone: Tz, raw: &str) -> Result<Self, CoreError> {
        let days = serde_json::from_str(raw)?;
        Ok(Self { zone, days })
    }

    /// Number of dates covered.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// First and last covered date.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.days.keys().next()?;
        let last = self.days.keys().next_back()?;
        Some((*first, *last))
    }
}

impl<Tz> EventTimeProvider for TimetableFile<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    fn daily_events(
        &self,
        date: NaiveDate,
        _coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        let day = self.days.get(&date).ok_or_else(|| ProviderError::Unavailable {
            date,
            message: "date not covered by timetable file".into(),
        })?;
        day.iter()
            .map(|(name, time)| {
                local_instant(&self.zone, date, time.to_naive_time())
                    .map(|at| DailyEvent::new(name.clone(), at))
                    .ok_or_else(|| ProviderError::Unavailable {
                        date,
                        message: format!("{name} at {time} does not exist locally"),
                    })
            })
            .collect()
    }
}
