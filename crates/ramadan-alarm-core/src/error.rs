//! Core error types for ramadan-alarm-core.
//!
//! This module defines the error hierarchy using thiserror. Each collaborator
//! of the scheduler (store, provider, notification sink) has its own error
//! type so a failure can be handled locally without aborting work on other
//! alarms.

use std::path::PathBuf;
use thiserror::Error;

use crate::alarm::AlarmId;

/// Core error type for ramadan-alarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Event time provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Notification delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The alarm id is not in the store
    #[error("Alarm '{0}' not found")]
    NotFound(AlarmId),

    /// The scheduler service has shut down
    #[error("Scheduler service is not running")]
    ServiceStopped,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Reading a key failed
    #[error("Failed to read '{key}': {message}")]
    ReadFailed { key: String, message: String },

    /// Writing a key failed; nothing was written
    #[error("Failed to write '{key}': {message}")]
    WriteFailed { key: String, message: String },

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// Any other backend failure
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Serializing the alarm list failed
    #[error("Failed to serialize alarms: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Event time provider errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider could not produce events for the date
    #[error("No daily events available for {date}: {message}")]
    Unavailable {
        date: chrono::NaiveDate,
        message: String,
    },

    /// The provider answered but a required event is missing
    #[error("Daily events for {date} do not contain '{name}'")]
    MissingEvent {
        date: chrono::NaiveDate,
        name: String,
    },
}

/// Notification delivery errors. Always non-fatal for scheduling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The platform refused to show notifications
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The selected sound could not be played
    #[error("Sound '{0}' is not playable")]
    SoundUnavailable(String),

    /// Any other sink failure
    #[error("Notification sink failed: {0}")]
    Failed(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Alarm ids must be non-empty
    #[error("Alarm id must not be empty")]
    EmptyId,

    /// Label longer than allowed
    #[error("Label is {len} characters long (max {max})")]
    LabelTooLong { len: usize, max: usize },

    /// Time of day could not be parsed
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    /// Weekday tag could not be parsed
    #[error("Invalid day '{0}', expected one of Mon, Tue, Wed, Thu, Fri, Sat, Sun")]
    InvalidDay(String),

    /// Alarm kind could not be parsed
    #[error("Invalid alarm type '{0}', expected sehri, iftar or custom")]
    InvalidKind(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StoreError::Locked
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
