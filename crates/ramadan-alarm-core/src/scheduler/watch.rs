use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Offset};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::clock::Clock;
use super::service::SchedulerHandle;
use crate::storage::Config;

/// Detects wall-clock jumps, suspension and timezone changes.
///
/// Every `interval` it compares how far the wall clock moved with how far
/// the monotonic clock moved. A difference above `tolerance`, or a changed
/// UTC offset, triggers [`SchedulerHandle::resume`]. Other ticks call
/// [`SchedulerHandle::sync`] so edits made by other processes are picked up.
#[derive(Debug, Clone, Copy)]
pub struct ResumeWatch {
    interval: Duration,
    tolerance: chrono::Duration,
}

impl ResumeWatch {
    pub fn new(interval: Duration, tolerance: chrono::Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            tolerance,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.schedule.resume_check_secs),
            chrono::Duration::seconds(
                i64::try_from(config.schedule.resume_tolerance_secs).unwrap_or(i64::MAX),
            ),
        )
    }

    /// Run until the scheduler stops.
    pub fn spawn(self, handle: SchedulerHandle, clock: Arc<dyn Clock>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut last_wall = clock.now();
            let mut last_mono = Instant::now();
            loop {
                ticker.tick().await;
                let wall = clock.now();
                let mono = Instant::now();

                let result = if self.jumped(last_wall, wall, mono - last_mono) {
                    handle.resume().await
                } else {
                    handle.sync().await
                };
                if result.is_err() {
                    break;
                }
                last_wall = wall;
                last_mono = mono;
            }
            debug!("resume watch stopped");
        })
    }

    fn jumped(&self, last_wall: DateTime<Local>, wall: DateTime<Local>, mono: Duration) -> bool {
        if last_wall.offset().fix() != wall.offset().fix() {
            info!(from = %last_wall.offset(), to = %wall.offset(), "timezone changed");
            return true;
        }
        let mono = chrono::Duration::from_std(mono).unwrap_or_else(|_| chrono::Duration::days(365));
        let drift = (wall - last_wall) - mono;
        if drift.abs() > self.tolerance {
            info!(drift_secs = drift.num_seconds(), "wall clock jumped");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn watch() -> ResumeWatch {
        ResumeWatch::new(Duration::from_secs(30), chrono::Duration::seconds(60))
    }

    #[test]
    fn steady_clock_is_not_a_jump() {
        let t = Local.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert!(!watch().jumped(t, t + chrono::Duration::seconds(30), Duration::from_secs(30)));
        assert!(!watch().jumped(t, t + chrono::Duration::seconds(75), Duration::from_secs(30)));
    }

    #[test]
    fn forward_and_backward_jumps_are_detected() {
        let t = Local.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert!(watch().jumped(t, t + chrono::Duration::hours(1), Duration::from_secs(30)));
        assert!(watch().jumped(t, t - chrono::Duration::minutes(5), Duration::from_secs(30)));
    }
}
