use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::provider::{Coordinates, DailyEvent, EventTimeProvider};
use super::timetable::FixedTimetable;
use crate::error::ProviderError;

type CacheKey = (NaiveDate, (u64, u64));

/// Memoizes successful lookups per `(date, coordinates)`.
///
/// Failures are not cached, so the next resolution retries the inner
/// provider. When full, the oldest dates are evicted first.
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, Vec<DailyEvent>>>,
}

impl<P: EventTimeProvider> CachedProvider<P> {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(inner: P) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: EventTimeProvider> EventTimeProvider for CachedProvider<P> {
    fn daily_events(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        let key = (date, coordinates.key());
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(hit.clone());
        }

        let events = self.inner.daily_events(date, coordinates)?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            let Some(oldest) = entries.keys().min().copied() else {
                break;
            };
            entries.remove(&oldest);
        }
        entries.insert(key, events.clone());
        debug!(%date, cached = entries.len(), "cached daily events");
        Ok(events)
    }
}

/// Falls back to a fixed timetable when the primary provider fails.
///
/// This keeps provider failures out of the scheduler: it always receives a
/// deterministic answer.
#[derive(Debug)]
pub struct WithFallback<P, F = FixedTimetable> {
    primary: P,
    fallback: F,
}

impl<P: EventTimeProvider> WithFallback<P, FixedTimetable> {
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallback: FixedTimetable::local(),
        }
    }
}

impl<P: EventTimeProvider> WithFallback<CachedProvider<P>, FixedTimetable> {
    /// Cache in front of the primary only, so fallback answers are never
    /// cached and a failed day is retried on the next lookup.
    pub fn cached(primary: P) -> Self {
        Self::new(CachedProvider::new(primary))
    }
}

impl<P: EventTimeProvider, F: EventTimeProvider> WithFallback<P, F> {
    pub fn with_fallback(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }
}

impl<P: EventTimeProvider, F: EventTimeProvider> EventTimeProvider for WithFallback<P, F> {
    fn daily_events(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        match self.primary.daily_events(date, coordinates) {
            Ok(events) => Ok(events),
            Err(err) => {
                warn!(%date, error = %err, "prayer times unavailable, using fallback timetable");
                self.fallback.daily_events(date, coordinates)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::MAGHRIB;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl EventTimeProvider for Counting {
        fn daily_events(
            &self,
            date: NaiveDate,
            _coordinates: Coordinates,
        ) -> Result<Vec<DailyEvent>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Unavailable {
                    date,
                    message: "offline".into(),
                });
            }
            let at = Utc.from_utc_datetime(&date.and_hms_opt(18, 0, 0).unwrap());
            Ok(vec![DailyEvent::new(MAGHRIB, at)])
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn cache_hits_skip_inner_provider() {
        let cached = CachedProvider::new(Counting::new(false));
        cached.daily_events(day(1), Coordinates::MECCA).unwrap();
        cached.daily_events(day(1), Coordinates::MECCA).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_is_keyed_by_coordinates() {
        let cached = CachedProvider::new(Counting::new(false));
        cached.daily_events(day(1), Coordinates::MECCA).unwrap();
        cached
            .daily_events(day(1), Coordinates::new(40.0, -74.0).unwrap())
            .unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cached = CachedProvider::new(Counting::new(true));
        assert!(cached.daily_events(day(1), Coordinates::MECCA).is_err());
        assert!(cached.daily_events(day(1), Coordinates::MECCA).is_err());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[test]
    fn oldest_date_is_evicted_first() {
        let cached = CachedProvider::with_capacity(Counting::new(false), 2);
        cached.daily_events(day(1), Coordinates::MECCA).unwrap();
        cached.daily_events(day(2), Coordinates::MECCA).unwrap();
        cached.daily_events(day(3), Coordinates::MECCA).unwrap();
        assert_eq!(cached.len(), 2);

        // day 2 is still cached, day 1 is fetched again
        cached.daily_events(day(2), Coordinates::MECCA).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 3);
        cached.daily_events(day(1), Coordinates::MECCA).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn fallback_answers_when_primary_fails() {
        let provider =
            WithFallback::with_fallback(Counting::new(true), FixedTimetable::new(Utc));
        let maghrib = provider.event(day(5), Coordinates::MECCA, MAGHRIB).unwrap();
        assert_eq!(maghrib, Utc.with_ymd_and_hms(2025, 3, 5, 18, 10, 0).unwrap());
    }

    #[test]
    fn failed_days_are_retried_behind_fallback() {
        let provider = WithFallback::cached(Counting::new(true));
        provider.event(day(5), Coordinates::MECCA, MAGHRIB).unwrap();
        provider.event(day(5), Coordinates::MECCA, MAGHRIB).unwrap();
        assert_eq!(provider.primary().inner().calls.load(Ordering::SeqCst), 2);
        assert!(provider.primary().is_empty());
    }

    #[test]
    fn primary_wins_when_available() {
        let provider =
            WithFallback::with_fallback(Counting::new(false), FixedTimetable::new(Utc));
        let maghrib = provider.event(day(5), Coordinates::MECCA, MAGHRIB).unwrap();
        assert_eq!(maghrib, Utc.with_ymd_and_hms(2025, 3, 5, 18, 0, 0).unwrap());
    }
}
