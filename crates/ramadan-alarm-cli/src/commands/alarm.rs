//! Alarm management commands for CLI.

use chrono::Local;
use clap::Subcommand;
use ramadan_alarm_core::{ringtone, Alarm, AlarmId, AlarmKind, Config, Day, SlotState, TimeOfDay};
use serde_json::json;

use super::{format_local, Context};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// List stored alarms as JSON
    List,
    /// Add an alarm
    Add {
        /// sehri, iftar or custom
        kind: AlarmKind,
        /// Time of day as HH:MM (required for custom alarms)
        #[arg(long)]
        time: Option<TimeOfDay>,
        /// Notification title
        #[arg(long, default_value = "")]
        label: String,
        /// Comma-separated weekdays (default: every day)
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<Day>>,
        /// Ringtone id (default: notifications.default_ringtone)
        #[arg(long)]
        ringtone: Option<String>,
        /// Explicit id instead of a generated one
        #[arg(long)]
        id: Option<String>,
        /// Store the alarm switched off
        #[arg(long)]
        disabled: bool,
    },
    /// Change an existing alarm
    Edit {
        /// Alarm ID
        id: String,
        /// New time of day as HH:MM
        #[arg(long)]
        time: Option<TimeOfDay>,
        /// New label
        #[arg(long)]
        label: Option<String>,
        /// Comma-separated weekdays; pass "" for none
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<String>>,
        /// New ringtone id
        #[arg(long)]
        ringtone: Option<String>,
    },
    /// Delete an alarm
    Remove {
        /// Alarm ID
        id: String,
    },
    /// Switch an alarm on
    Enable {
        /// Alarm ID
        id: String,
    },
    /// Switch an alarm off
    Disable {
        /// Alarm ID
        id: String,
    },
    /// Show when each alarm fires next
    Next,
}

fn default_time(kind: AlarmKind) -> Result<TimeOfDay, Box<dyn std::error::Error>> {
    match kind {
        AlarmKind::Sehri => Ok(TimeOfDay::new(4, 30)?),
        AlarmKind::Iftar => Ok(TimeOfDay::new(18, 45)?),
        AlarmKind::Custom => Err("custom alarms need --time HH:MM".into()),
    }
}

fn known_ringtone(id: String) -> Result<String, Box<dyn std::error::Error>> {
    if !ringtone::is_known(&id) {
        return Err(format!("unknown ringtone '{id}' (see `ramadan-alarm ringtone list`)").into());
    }
    Ok(id)
}

fn parse_days(raw: &[String]) -> Result<Vec<Day>, Box<dyn std::error::Error>> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Day>().map_err(Into::into))
        .collect()
}

fn slot_json(slot: &SlotState) -> serde_json::Value {
    match slot {
        SlotState::Armed(o) => json!({ "status": "armed", "next": format_local(o.at) }),
        SlotState::Unarmed { reason } => json!({ "status": "unarmed", "reason": reason }),
    }
}

pub fn run(ctx: &Context, action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut scheduler = ctx.offline_scheduler(&config)?;
    let now = Local::now();

    match action {
        AlarmAction::List => {
            println!("{}", serde_json::to_string_pretty(scheduler.alarms())?);
        }
        AlarmAction::Add {
            kind,
            time,
            label,
            days,
            ringtone,
            id,
            disabled,
        } => {
            let time = match time {
                Some(t) => t,
                None => default_time(kind)?,
            };
            let ringtone = match ringtone {
                Some(id) => known_ringtone(id)?,
                None => config.notifications.default_ringtone.clone(),
            };
            let mut alarm = Alarm::new(kind, time, label).with_ringtone(ringtone);
            if let Some(days) = days {
                alarm = alarm.with_days(days);
            }
            if let Some(id) = id {
                if scheduler.alarm(&AlarmId::new(id.as_str())).is_some() {
                    return Err(format!("alarm '{id}' already exists").into());
                }
                alarm = alarm.with_id(id);
            }
            alarm.active = !disabled;

            let slot = scheduler.upsert_alarm(alarm.clone(), now)?;
            println!("Alarm saved: {}", alarm.id);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "alarm": alarm, "schedule": slot_json(&slot) }))?
            );
        }
        AlarmAction::Edit {
            id,
            time,
            label,
            days,
            ringtone,
        } => {
            let id = AlarmId::new(id);
            let mut alarm = scheduler
                .alarm(&id)
                .cloned()
                .ok_or_else(|| format!("alarm '{id}' not found"))?;
            if let Some(time) = time {
                alarm.time = time;
            }
            if let Some(label) = label {
                alarm.label = label;
            }
            if let Some(days) = days {
                alarm.days = parse_days(&days)?;
            }
            if let Some(ringtone) = ringtone {
                alarm.ringtone = known_ringtone(ringtone)?;
            }

            let slot = scheduler.upsert_alarm(alarm.clone(), now)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "alarm": alarm, "schedule": slot_json(&slot) }))?
            );
        }
        AlarmAction::Remove { id } => {
            scheduler.remove_alarm(&AlarmId::new(id.as_str()), now)?;
            println!("Alarm removed: {id}");
        }
        AlarmAction::Enable { id } => {
            let slot = scheduler.set_active(&AlarmId::new(id), true, now)?;
            println!("{}", serde_json::to_string_pretty(&slot_json(&slot))?);
        }
        AlarmAction::Disable { id } => {
            let slot = scheduler.set_active(&AlarmId::new(id), false, now)?;
            println!("{}", serde_json::to_string_pretty(&slot_json(&slot))?);
        }
        AlarmAction::Next => {
            scheduler.rebuild(now);
            let rows: Vec<_> = scheduler
                .alarms()
                .iter()
                .map(|alarm| {
                    let mut row = json!({
                        "id": alarm.id,
                        "title": alarm.title(),
                        "type": alarm.kind,
                        "repeat": alarm.repeat_summary(),
                    });
                    if let (Some(obj), Some(slot)) = (row.as_object_mut(), scheduler.slot(&alarm.id)) {
                        if let serde_json::Value::Object(extra) = slot_json(slot) {
                            obj.extend(extra);
                        }
                    }
                    row
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
