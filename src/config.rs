use crate::database::Database;
use crate::models::{FilterMode, Priority};

pub const DEFAULT_FILTER_KEY: &str = "default_filter";
pub const DEFAULT_PRIORITY_KEY: &str = "default_priority";

pub const KNOWN_KEYS: [(&str, &str); 2] = [
    (DEFAULT_FILTER_KEY, "Filter shown at startup: all, active or completed"),
    (DEFAULT_PRIORITY_KEY, "Priority the input panel resets to: high, medium or low"),
];

pub fn describe(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, description)| *description)
}

/// Settings resolved from the config table at startup.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settings {
    pub default_filter: FilterMode,
    pub default_priority: Priority,
}

impl Settings {
    /// Unset, unreadable or invalid entries fall back to defaults.
    pub fn load(db: &Database) -> Self {
        Settings {
            default_filter: read_setting(db, DEFAULT_FILTER_KEY),
            default_priority: read_setting(db, DEFAULT_PRIORITY_KEY),
        }
    }
}

fn read_setting<T>(db: &Database, key: &str) -> T
where
    T: std::str::FromStr<Err = anyhow::Error> + Default,
{
    match db.get_config(key) {
        Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
            log::warn!("ignoring config '{}': {}", key, e);
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("could not read config '{}': {}", key, e);
            T::default()
        }
    }
}

/// Checks a value before it is stored; unknown keys are accepted as-is.
pub fn validate(key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        DEFAULT_FILTER_KEY => value.parse::<FilterMode>().map(|_| ()),
        DEFAULT_PRIORITY_KEY => value.parse::<Priority>().map(|_| ()),
        _ => Ok(()),
    }
}
