//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Scheduling policy (grace window, sehri offset, resume detection)
//! - The last known location
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/ramadan-alarm/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::prayer::Coordinates;
use crate::ringtone::DEFAULT_RINGTONE_ID;

/// Scheduling policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// How late an occurrence may be delivered after a resume.
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,
    /// Minutes before Fajr at which sehri alarms fire.
    #[serde(default = "default_sehri_offset_min")]
    pub sehri_offset_min: i64,
    /// How often the daemon compares wall and monotonic clocks.
    #[serde(default = "default_resume_check_secs")]
    pub resume_check_secs: u64,
    /// Drift between the two clocks treated as a jump or a suspension.
    #[serde(default = "default_resume_tolerance_secs")]
    pub resume_tolerance_secs: u64,
}

/// Last known location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Ringtone given to alarms created without one.
    #[serde(default = "default_ringtone")]
    pub default_ringtone: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/ramadan-alarm/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

const MAX_GRACE_WINDOW_SECS: u64 = 24 * 60 * 60;
const MAX_SEHRI_OFFSET_MIN: i64 = 24 * 60;

// Default functions
fn default_grace_window_secs() -> u64 {
    300
}
fn default_sehri_offset_min() -> i64 {
    10
}
fn default_resume_check_secs() -> u64 {
    30
}
fn default_resume_tolerance_secs() -> u64 {
    60
}
fn default_latitude() -> f64 {
    Coordinates::MECCA.latitude
}
fn default_longitude() -> f64 {
    Coordinates::MECCA.longitude
}
fn default_true() -> bool {
    true
}
fn default_ringtone() -> String {
    DEFAULT_RINGTONE_ID.into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            grace_window_secs: default_grace_window_secs(),
            sehri_offset_min: default_sehri_offset_min(),
            resume_check_secs: default_resume_check_secs(),
            resume_tolerance_secs: default_resume_tolerance_secs(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ringtone: default_ringtone(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(unknown());
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is rejected.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinates().map_err(|e| ConfigError::InvalidValue {
            key: "location".into(),
            message: e.to_string(),
        })?;
        if self.schedule.grace_window_secs > MAX_GRACE_WINDOW_SECS {
            return Err(ConfigError::InvalidValue {
                key: "schedule.grace_window_secs".into(),
                message: format!("must be at most {MAX_GRACE_WINDOW_SECS}"),
            });
        }
        if !(-MAX_SEHRI_OFFSET_MIN..=MAX_SEHRI_OFFSET_MIN).contains(&self.schedule.sehri_offset_min) {
            return Err(ConfigError::InvalidValue {
                key: "schedule.sehri_offset_min".into(),
                message: format!("must be within -{MAX_SEHRI_OFFSET_MIN}..={MAX_SEHRI_OFFSET_MIN}"),
            });
        }
        if self.schedule.resume_check_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "schedule.resume_check_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn coordinates(&self) -> Result<Coordinates, crate::error::ValidationError> {
        Coordinates::new(self.location.latitude, self.location.longitude)
    }

    /// Clamped to one day so a hand-edited file cannot overflow.
    pub fn grace_window(&self) -> chrono::Duration {
        let secs = self.schedule.grace_window_secs.min(MAX_GRACE_WINDOW_SECS);
        chrono::Duration::try_seconds(secs as i64).unwrap_or(chrono::Duration::zero())
    }

    pub fn sehri_offset(&self) -> chrono::Duration {
        let min = self
            .schedule
            .sehri_offset_min
            .clamp(-MAX_SEHRI_OFFSET_MIN, MAX_SEHRI_OFFSET_MIN);
        chrono::Duration::try_minutes(min).unwrap_or(chrono::Duration::zero())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
