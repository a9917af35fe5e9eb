//! Fixed ringtone registry.
//!
//! Alarms reference a ringtone by id. Lookups never fail: an unknown id
//! resolves to the default ringtone, so a retired id in old data still plays
//! something.

use serde::Serialize;

pub const DEFAULT_RINGTONE_ID: &str = "default";

/// A playable sound shipped with the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ringtone {
    pub id: &'static str,
    pub name: &'static str,
    /// Path relative to the sounds directory.
    pub file: &'static str,
}

pub const RINGTONES: &[Ringtone] = &[
    Ringtone {
        id: DEFAULT_RINGTONE_ID,
        name: "Default Alarm",
        file: "alarm-sound.mp3",
    },
    Ringtone {
        id: "adhan1",
        name: "Adhan - Classic",
        file: "ringtones/adhan1.mp3",
    },
    Ringtone {
        id: "adhan2",
        name: "Adhan - Makkah",
        file: "ringtones/adhan2.mp3",
    },
    Ringtone {
        id: "gentle",
        name: "Gentle Reminder",
        file: "ringtones/gentle.mp3",
    },
    Ringtone {
        id: "nature",
        name: "Nature Sounds",
        file: "ringtones/nature.mp3",
    },
];

pub fn all() -> &'static [Ringtone] {
    RINGTONES
}

pub fn find(id: &str) -> Option<&'static Ringtone> {
    RINGTONES.iter().find(|r| r.id == id)
}

pub fn is_known(id: &str) -> bool {
    find(id).is_some()
}

/// Ringtone for `id`, falling back to the default.
pub fn resolve(id: &str) -> &'static Ringtone {
    find(id).unwrap_or(&RINGTONES[0])
}

/// Sound file for `id`. Always a valid reference.
pub fn file(id: &str) -> &'static str {
    resolve(id).file
}
