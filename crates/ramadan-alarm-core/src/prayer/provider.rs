use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ValidationError};

pub const FAJR: &str = "Fajr";
pub const MAGHRIB: &str = "Maghrib";

/// Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Used when no location has been acquired.
    pub const MECCA: Coordinates = Coordinates {
        latitude: 21.3891,
        longitude: 39.8579,
    };

    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidValue {
                field: "latitude".into(),
                message: format!("{latitude} is outside -90..=90"),
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidValue {
                field: "longitude".into(),
                message: format!("{longitude} is outside -180..=180"),
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Bitwise identity, usable as a map key.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::MECCA
    }
}

/// One named instant of a day, e.g. `Fajr` or `Maghrib`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEvent {
    pub name: String,
    pub at: DateTime<Utc>,
}

impl DailyEvent {
    pub fn new(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            at,
        }
    }
}

/// Source of daily prayer instants.
///
/// Implementations must be deterministic for a given `(date, coordinates)`.
/// They are called from the scheduler's single task, so a slow provider
/// delays every alarm; network-backed providers should prefetch.
pub trait EventTimeProvider: Send + Sync {
    /// All named instants for `date` at `coordinates`.
    fn daily_events(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError>;

    /// The instant named `name` on `date`.
    fn event(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
        name: &str,
    ) -> Result<DateTime<Utc>, ProviderError> {
        self.daily_events(date, coordinates)?
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.at)
            .ok_or_else(|| ProviderError::MissingEvent {
                date,
                name: name.to_string(),
            })
    }
}

impl<P: EventTimeProvider + ?Sized> EventTimeProvider for Box<P> {
    fn daily_events(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        (**self).daily_events(date, coordinates)
    }
}

impl<P: EventTimeProvider + ?Sized> EventTimeProvider for Arc<P> {
    fn daily_events(
        &self,
        date: NaiveDate,
        coordinates: Coordinates,
    ) -> Result<Vec<DailyEvent>, ProviderError> {
        (**self).daily_events(date, coordinates)
    }
}
