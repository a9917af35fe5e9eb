pub mod alarm;
pub mod config;
pub mod ringtone;
pub mod run;
pub mod times;

use std::error::Error;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use ramadan_alarm_core::scheduler::ManualTimers;
use ramadan_alarm_core::{
    AlarmStore, Config, Coordinates, EventTimeProvider, FixedTimetable,
    Scheduler, SchedulerPolicy, SqliteKv, TimetableFile, TracingSink, WithFallback,
};

/// Options shared by every command.
pub struct Context {
    timetable: Option<PathBuf>,
}

impl Context {
    pub fn new(timetable: Option<PathBuf>) -> Self {
        Self { timetable }
    }

    /// Prayer times from `--timetable` with the fixed table as fallback, or
    /// the fixed table alone.
    pub fn provider(&self) -> Result<Box<dyn EventTimeProvider>, Box<dyn Error>> {
        let provider: Box<dyn EventTimeProvider> = match &self.timetable {
            Some(path) => {
                let file = TimetableFile::load(path)?;
                Box::new(WithFallback::cached(file))
            }
            None => Box::new(FixedTimetable::local()),
        };
        Ok(provider)
    }

    pub fn store(&self) -> Result<AlarmStore, Box<dyn Error>> {
        Ok(AlarmStore::new(SqliteKv::open()?))
    }

    /// A scheduler over the stored alarms whose timers are never run. Used by
    /// one-shot commands to validate, persist and resolve.
    pub fn offline_scheduler(&self, config: &Config) -> Result<Scheduler, Box<dyn Error>> {
        Ok(Scheduler::new(
            self.store()?,
            self.provider()?,
            Box::new(TracingSink),
            Box::new(ManualTimers::new()),
            coordinates(config)?,
            SchedulerPolicy::from(config),
        ))
    }
}

pub fn coordinates(config: &Config) -> Result<Coordinates, Box<dyn Error>> {
    Ok(config.coordinates()?)
}

/// `2025-03-01 18:21 (Sat)` in local time.
pub fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M (%a)").to_string()
}
