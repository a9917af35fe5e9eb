mod alarm_store;
mod config;
pub mod database;
mod kv;

pub use alarm_store::{AlarmStore, ALARMS_KEY};
pub use config::{Config, LocationConfig, NotificationsConfig, ScheduleConfig};
pub use database::SqliteKv;
pub use kv::{KeyValueStore, MemoryKv};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/ramadan-alarm[-dev]/` based on RAMADAN_ALARM_ENV.
///
/// Set RAMADAN_ALARM_ENV=dev to use the development data directory, or
/// RAMADAN_ALARM_HOME to use an explicit directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("RAMADAN_ALARM_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("RAMADAN_ALARM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("ramadan-alarm-dev")
            } else {
                base_dir.join("ramadan-alarm")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
