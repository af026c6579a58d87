//! Wall-clock schedule matching.

use std::sync::Arc;

use chrono::{Datelike, Local, Timelike, Weekday};
use lumen_config::ScheduledEffectConfig;
use parking_lot::Mutex;

/// Local day and time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Day of the week
    pub weekday: Weekday,
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub minute: u32,
}

impl LocalTime {
    /// Create a local time.
    pub const fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            weekday,
            hour,
            minute,
        }
    }

    /// English name of the weekday, as used in site files.
    pub fn day_name(&self) -> &'static str {
        weekday_name(self.weekday)
    }
}

/// Source of the local time used for schedule decisions.
pub trait WallClock: Send + Sync {
    /// Current local time.
    fn now(&self) -> LocalTime;
}

/// The host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> LocalTime {
        let now = Local::now();
        LocalTime::new(now.weekday(), now.hour(), now.minute())
    }
}

/// Clock that reports whatever it was last set to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<LocalTime>>,
}

impl ManualClock {
    /// Clock starting at `time`.
    pub fn new(time: LocalTime) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock; clones observe the change.
    pub fn set(&self, time: LocalTime) {
        *self.time.lock() = time;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> LocalTime {
        *self.time.lock()
    }
}

/// English name of `weekday`.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Whether `entry` is active at `time`.
pub fn is_active(entry: &ScheduledEffectConfig, time: LocalTime) -> bool {
    entry.runs_on(time.day_name()) && entry.window_contains(time.hour, time.minute)
}

/// First entry, in declared order, active at `time`.
pub fn first_active(entries: &[ScheduledEffectConfig], time: LocalTime) -> Option<&ScheduledEffectConfig> {
    entries.iter().find(|entry| is_active(entry, time))
}
