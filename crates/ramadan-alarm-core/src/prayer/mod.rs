//! Daily prayer events consumed by the resolver.
//!
//! The core never computes prayer times itself. It asks an
//! [`EventTimeProvider`] for the named instants of one calendar day at one
//! location. Providers compose: [`CachedProvider`] memoizes per day and
//! [`WithFallback`] substitutes a deterministic timetable when the primary
//! source fails. [`TimetableFile`] reads published per-date times.
//! [`prayer_days`] and [`next_prayer`] list the prayers themselves.

mod cache;
mod file;
mod period;
mod provider;
mod timetable;

pub use cache::{CachedProvider, WithFallback};
pub use file::TimetableFile;
pub use period::{next_prayer, prayer_days, PrayerDay};
pub use provider::{Coordinates, DailyEvent, EventTimeProvider, FAJR, MAGHRIB};
pub use timetable::FixedTimetable;
