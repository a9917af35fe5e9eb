//! Alarm scheduling: the synchronous state machine, its timer and clock
//! seams, and the tokio service that drives it.

mod clock;
mod driver;
mod engine;
mod service;
mod watch;

pub use clock::{Clock, ManualClock, SimulatedClock, SystemClock};
pub use driver::{ArmToken, ManualTimers, TimerDriver};
pub use engine::{Occurrence, Scheduler, SchedulerPolicy, SlotState, DEFAULT_GRACE_WINDOW_SECS};
pub use service::{SchedulerHandle, SchedulerService, TokioTimers};
pub use watch::ResumeWatch;
