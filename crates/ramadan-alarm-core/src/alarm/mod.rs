mod day;
mod model;

pub use day::{Day, TimeOfDay};
pub use model::{Alarm, AlarmId, AlarmKind, MAX_LABEL_LEN};
