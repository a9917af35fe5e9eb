use clap::Subcommand;
use ramadan_alarm_core::{ringtone, Config};

#[derive(Subcommand)]
pub enum RingtoneAction {
    /// List available ringtones
    List,
    /// Set the ringtone given to new alarms
    SetDefault {
        /// Ringtone id
        id: String,
    },
}

pub fn run(action: RingtoneAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RingtoneAction::List => {
            println!("{}", serde_json::to_string_pretty(ringtone::all())?);
        }
        RingtoneAction::SetDefault { id } => {
            let Some(tone) = ringtone::find(&id) else {
                return Err(format!("unknown ringtone '{id}'").into());
            };
            let mut config = Config::load()?;
            config.set("notifications.default_ringtone", tone.id)?;
            println!("default ringtone: {} ({})", tone.id, tone.name);
        }
    }
    Ok(())
}
