//! # Ramadan Alarm Core Library
//!
//! This library provides the scheduling core of the Ramadan alarm app: it
//! decides when each user alarm must fire, keeps exactly one timer per alarm,
//! and delivers at most one notification per occurrence across restarts,
//! suspension and clock changes. The `ramadan-alarm` CLI is a thin layer over
//! the same library.
//!
//! ## Architecture
//!
//! - **Resolver**: pure function from (alarm, now, location, prayer times) to
//!   the next firing instant
//! - **Scheduler**: a synchronous state machine; callers pass `now` and plug
//!   in timers, a notification sink and a prayer time provider
//! - **Service**: a tokio task that owns the scheduler and turns timer
//!   expiries and requests into a single ordered stream
//! - **Storage**: the alarm list as one JSON blob in SQLite, plus TOML
//!   configuration
//!
//! ## Key Components
//!
//! - [`Alarm`]: the persisted alarm model
//! - [`OccurrenceResolver`]: next-occurrence computation
//! - [`Scheduler`]: alarm state machine
//! - [`SchedulerService`]: async driver returning a [`SchedulerHandle`]
//! - [`EventTimeProvider`]: source of Fajr and Maghrib per day
//! - [`NotificationSink`]: where alerts go

pub mod alarm;
pub mod error;
pub mod events;
pub mod notify;
pub mod prayer;
pub mod resolver;
pub mod ringtone;
pub mod scheduler;
pub mod storage;

pub use alarm::{Alarm, AlarmId, AlarmKind, Day, TimeOfDay};
pub use error::{
    ConfigError, CoreError, DeliveryError, ProviderError, StoreError, ValidationError,
};
pub use events::Event;
pub use notify::{Notification, NotificationSink, RecordingSink, TracingSink};
pub use prayer::{
    next_prayer, prayer_days, CachedProvider, Coordinates, DailyEvent, EventTimeProvider,
    FixedTimetable, PrayerDay, TimetableFile, WithFallback,
};
pub use resolver::{OccurrenceResolver, RamadanDay, Resolution, UnarmedReason};
pub use scheduler::{
    ArmToken, Clock, Occurrence, ResumeWatch, Scheduler, SchedulerHandle, SchedulerPolicy,
    SchedulerService, SlotState, SystemClock, TimerDriver,
};
pub use storage::{AlarmStore, Config, KeyValueStore, MemoryKv, SqliteKv};
