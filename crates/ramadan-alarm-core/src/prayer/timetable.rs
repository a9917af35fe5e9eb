use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use super::provider::{Coordinates, DailyEvent, EventTimeProvider};
use crate::error::ProviderError;

/// Same wall-clock prayer times every day, ignoring location.
///
/// This is the deterministic fallback used when the real source of prayer
/// times is unavailable. The default table is Fajr 05:15, Sunrise 06:30,
/// Dhuhr 12:15, Asr 15:45, Maghrib 18:10, Isha 19:30.
#[derive(Debug, Clone)]
pub struct FixedTimetable<Tz: TimeZone = Local> {
    zone: Tz,
    entries: Vec<(String, NaiveTime)>,
}

const DEFAULT_TABLE: [(&str, u32, u32); 6] = [
    ("Fajr", 5, 15),
    ("Sunrise", 6, 30),
    ("Dhuhr", 12, 15),
    ("Asr", 15, 45),
    ("Maghrib", 18, 10),
    ("Isha", 19, 30),
];

impl FixedTimetable<Local> {
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl Default for FixedTimetable<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> FixedTimetable<Tz> {
    pub fn new(zone: Tz) -> Self {
        let entries = DEFAULT_TABLE
            .iter()
            .filter_map(|&(name, h, m)| {
                NaiveTime::from_hms_opt(h, m, 0).map(|t| (name.to_string(), t))
            })
            .collect();
        Self { zone, entries }
    }

    /// Replace the table, e.g. with times configured by the user.
    pub fn with_entries(zone: Tz, entries: Vec<(String, NaiveTime)>) -> Self {
        Self { zone, entries }
    }
}

/// Local wall-clock time on `date` as an instant. A time falling in a DST
/// gap moves forward by an hour; an ambiguous one takes the earlier.
pub(super) fn local_instant<Tz: TimeZone>(
    zone: &Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

impl<Tz> EventTimeProvider for FixedTimetable<Tz>
where
    Tz: TimeZone + Send + Sync,
{
    fn daily_events(
        &self,
        date: NaiveDate,
        _coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        self.entries
            .iter()
            .map(|(name, time)| {
                local_instant(&self.zone, date, *time)
                    .map(|at| DailyEvent::new(name.clone(), at))
                    .ok_or_else(|| ProviderError::Unavailable {
                        date,
                        message: format!("{name} at {time} does not exist locally"),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::{FAJR, MAGHRIB};
    use chrono::FixedOffset;

    #[test]
    fn default_table_in_fixed_zone() {
        let zone = FixedOffset::east_opt(3 * 3600).unwrap();
        let table = FixedTimetable::new(zone);
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let events = table.daily_events(date, Coordinates::MECCA).unwrap();
        assert_eq!(events.len(), 6);

        let maghrib = table.event(date, Coordinates::MECCA, MAGHRIB).unwrap();
        assert_eq!(maghrib, Utc.with_ymd_and_hms(2025, 3, 10, 15, 10, 0).unwrap());

        let fajr = table.event(date, Coordinates::MECCA, FAJR).unwrap();
        assert_eq!(fajr, Utc.with_ymd_and_hms(2025, 3, 10, 2, 15, 0).unwrap());
    }

    #[test]
    fn location_is_ignored() {
        let table = FixedTimetable::new(Utc);
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let a = table.daily_events(date, Coordinates::MECCA).unwrap();
        let b = table
            .daily_events(date, Coordinates::new(51.5, -0.1).unwrap())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_entries_replace_table() {
        let table = FixedTimetable::with_entries(
            Utc,
            vec![(MAGHRIB.to_string(), NaiveTime::from_hms_opt(19, 0, 0).unwrap())],
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(table.event(date, Coordinates::MECCA, FAJR).is_err());
        assert_eq!(
            table.event(date, Coordinates::MECCA, MAGHRIB).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 19, 0, 0).unwrap()
        );
    }
}
