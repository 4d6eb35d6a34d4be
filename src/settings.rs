//! Persisted user settings
//!
//! Only the monitor interval lives here. It is stored as a decimal string of
//! milliseconds under [`MONITOR_INTERVAL_KEY`] in the state database.

use crate::error::StoreError;
use crate::state::StateDb;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const MONITOR_INTERVAL_KEY: &str = "monitor_interval";

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// How often the periodic monitor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorInterval {
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    EightHours,
    SixteenHours,
    #[default]
    OneDay,
}

impl MonitorInterval {
    pub const ALL: [MonitorInterval; 8] = [
        MonitorInterval::FifteenMinutes,
        MonitorInterval::ThirtyMinutes,
        MonitorInterval::OneHour,
        MonitorInterval::TwoHours,
        MonitorInterval::FourHours,
        MonitorInterval::EightHours,
        MonitorInterval::SixteenHours,
        MonitorInterval::OneDay,
    ];

    pub fn as_millis(self) -> u64 {
        match self {
            MonitorInterval::FifteenMinutes => 15 * MINUTE_MS,
            MonitorInterval::ThirtyMinutes => 30 * MINUTE_MS,
            MonitorInterval::OneHour => HOUR_MS,
            MonitorInterval::TwoHours => 2 * HOUR_MS,
            MonitorInterval::FourHours => 4 * HOUR_MS,
            MonitorInterval::EightHours => 8 * HOUR_MS,
            MonitorInterval::SixteenHours => 16 * HOUR_MS,
            MonitorInterval::OneDay => DAY_MS,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }

    /// Short label, also accepted by [`FromStr`]
    pub fn label(self) -> &'static str {
        match self {
            MonitorInterval::FifteenMinutes => "15m",
            MonitorInterval::ThirtyMinutes => "30m",
            MonitorInterval::OneHour => "1h",
            MonitorInterval::TwoHours => "2h",
            MonitorInterval::FourHours => "4h",
            MonitorInterval::EightHours => "8h",
            MonitorInterval::SixteenHours => "16h",
            MonitorInterval::OneDay => "1d",
        }
    }

    pub fn from_millis(ms: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_millis() == ms)
    }

    /// Interpret a stored value; anything unrecognised is the default
    pub fn from_stored(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        match value.trim().parse::<u64>().ok().and_then(Self::from_millis) {
            Some(interval) => interval,
            None => {
                warn!("Ignoring unsupported monitor interval '{}'", value);
                Self::default()
            }
        }
    }
}

impl fmt::Display for MonitorInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MonitorInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.label().eq_ignore_ascii_case(s))
            .or_else(|| s.parse::<u64>().ok().and_then(Self::from_millis))
            .ok_or_else(|| {
                let choices: Vec<_> = Self::ALL.iter().map(|i| i.label()).collect();
                format!(
                    "unsupported interval '{}' (choose one of {})",
                    s,
                    choices.join(", ")
                )
            })
    }
}

/// Read the persisted monitor interval
pub fn monitor_interval(db: &StateDb) -> Result<MonitorInterval, StoreError> {
    let stored = db.get_setting(MONITOR_INTERVAL_KEY)?;
    Ok(MonitorInterval::from_stored(stored.as_deref()))
}

/// Persist the monitor interval
pub fn set_monitor_interval(db: &StateDb, interval: MonitorInterval) -> Result<(), StoreError> {
    db.put_setting(MONITOR_INTERVAL_KEY, &interval.as_millis().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_day() {
        assert_eq!(MonitorInterval::default().as_millis(), 86_400_000);
    }

    #[test]
    fn test_millis_values() {
        let millis: Vec<u64> = MonitorInterval::ALL.iter().map(|i| i.as_millis()).collect();
        assert_eq!(
            millis,
            vec![
                900_000, 1_800_000, 3_600_000, 7_200_000, 14_400_000, 28_800_000, 57_600_000,
                86_400_000
            ]
        );
    }

    #[test]
    fn test_from_stored() {
        assert_eq!(MonitorInterval::from_stored(None), MonitorInterval::OneDay);
        assert_eq!(
            MonitorInterval::from_stored(Some("3600000")),
            MonitorInterval::OneHour
        );
        // Not one of the selectable values
        assert_eq!(
            MonitorInterval::from_stored(Some("1234")),
            MonitorInterval::OneDay
        );
        assert_eq!(
            MonitorInterval::from_stored(Some("soon")),
            MonitorInterval::OneDay
        );
    }

    #[test]
    fn test_parse_labels_and_millis() {
        assert_eq!("15m".parse(), Ok(MonitorInterval::FifteenMinutes));
        assert_eq!("16H".parse(), Ok(MonitorInterval::SixteenHours));
        assert_eq!("7200000".parse(), Ok(MonitorInterval::TwoHours));
        assert!("3h".parse::<MonitorInterval>().is_err());
    }

    #[test]
    fn test_persisted_round_trip() {
        let db = StateDb::open_in_memory().unwrap();
        assert_eq!(monitor_interval(&db).unwrap(), MonitorInterval::OneDay);

        set_monitor_interval(&db, MonitorInterval::ThirtyMinutes).unwrap();
        assert_eq!(
            db.get_setting(MONITOR_INTERVAL_KEY).unwrap().as_deref(),
            Some("1800000")
        );
        assert_eq!(monitor_interval(&db).unwrap(), MonitorInterval::ThirtyMinutes);
    }
}
