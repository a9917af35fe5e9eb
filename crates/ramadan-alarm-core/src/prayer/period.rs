use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::provider::{Coordinates, DailyEvent, EventTimeProvider};
use crate::error::ProviderError;

/// Every prayer of one date, earliest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerDay {
    pub date: NaiveDate,
    pub prayers: Vec<DailyEvent>,
}

/// All prayers for `days` consecutive dates starting at `from`.
pub fn prayer_days(
    from: NaiveDate,
    days: u32,
    coordinates: Coordinates,
    provider: &dyn EventTimeProvider,
) -> Result<Vec<PrayerDay>, ProviderError> {
    (0..u64::from(days))
        .filter_map(|i| from.checked_add_days(Days::new(i)))
        .map(|date| {
            let mut prayers = provider.daily_events(date, coordinates)?;
            prayers.sort_by_key(|p| p.at);
            Ok(PrayerDay { date, prayers })
        })
        .collect()
}

/// The first prayer strictly after `now`, looking at today and then
/// tomorrow. A prayer at exactly `now` has passed.
pub fn next_prayer<Tz: TimeZone>(
    now: &DateTime<Tz>,
    coordinates: Coordinates,
    provider: &dyn EventTimeProvider,
) -> Result<Option<DailyEvent>, ProviderError> {
    let now_utc = now.with_timezone(&Utc);
    let today = now.date_naive();
    for date in [Some(today), today.succ_opt()].into_iter().flatten() {
        let next = provider
            .daily_events(date, coordinates)?
            .into_iter()
            .filter(|p| p.at > now_utc)
            .min_by_key(|p| p.at);
        if next.is_some() {
            return Ok(next);
        }
    }
    Ok(None)
}
