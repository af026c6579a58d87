//! Serde data model of a site file.

use lumen_wire::PixelWindow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default site frame rate.
pub const DEFAULT_FPS: u32 = 21;
/// Default canvas factory name.
pub const DEFAULT_CANVAS_TYPE: &str = "Canvas1D";
/// Default canvas width.
pub const DEFAULT_WIDTH: u32 = 144;
/// Default canvas height.
pub const DEFAULT_HEIGHT: u32 = 1;
/// Default number of frames per controller send.
pub const DEFAULT_BATCH_SIZE: u32 = 1;
/// Default controller playback buffer length in frames.
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 21;
/// Day-of-week entry that matches every day.
pub const ALL_DAYS: &str = "all";

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Generate an 8 hex character effect instance id.
pub fn new_effect_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// One site: a canvas, the controllers that display it and its schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationConfig {
    /// Unique site name
    pub name: String,
    /// Render rate
    pub frames_per_second: u32,
    /// Canvas factory name
    pub canvas_type: String,
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Whether control-plane callers may change effects
    pub is_api_enabled: bool,
    /// Controllers fed from this canvas
    pub controllers: Vec<ControllerConfig>,
    /// Scheduled effects, consulted in declared order
    pub scheduled_effects: Vec<ScheduledEffectConfig>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            frames_per_second: DEFAULT_FPS,
            canvas_type: DEFAULT_CANVAS_TYPE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            is_api_enabled: true,
            controllers: Vec::new(),
            scheduled_effects: Vec::new(),
        }
    }
}

impl LocationConfig {
    /// Create a site with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Pixels in the canvas.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

/// One controller window onto a site canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Host name or address, optionally `host:port`
    pub host: String,
    /// Display name
    pub name: String,
    /// First canvas pixel shown by this controller
    pub offset: u32,
    /// Window width; 0 means the full canvas width
    pub width: u32,
    /// Window height
    pub height: u32,
    /// Controller channel number
    pub channel: u16,
    /// Send `G,R,B` instead of `R,G,B`
    pub swap_red_green: bool,
    /// Send the window last pixel first
    pub reversed: bool,
    /// Wrap frames in the zlib envelope
    pub use_compression: bool,
    /// Frames that trigger a send
    pub batch_size: u32,
    /// Controller playback buffer length in frames
    pub frames_per_buffer: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            name: String::new(),
            offset: 0,
            width: 0,
            height: 1,
            channel: 0,
            swap_red_green: false,
            reversed: false,
            use_compression: false,
            batch_size: DEFAULT_BATCH_SIZE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
        }
    }
}

impl ControllerConfig {
    /// Create a controller for `host` with default settings.
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Pixel window on a canvas `canvas_width` pixels wide.
    ///
    /// A width of 0 covers the rest of the canvas from `offset`.
    pub fn window(&self, canvas_width: u32) -> PixelWindow {
        let width = if self.width == 0 {
            canvas_width.saturating_sub(self.offset)
        } else {
            self.width
        };
        PixelWindow::new(self.offset as usize, width as usize, self.height as usize)
    }
}

/// An effect the site runs on given days during a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduledEffectConfig {
    /// Registered effect name
    pub effect_name: String,
    /// Day names (`Monday`...) or `all`, case-insensitive
    pub days_of_week: Vec<String>,
    /// Window start hour
    pub start_hour: u32,
    /// Window start minute
    pub start_minute: u32,
    /// Window end hour
    pub end_hour: u32,
    /// Window end minute
    pub end_minute: u32,
    /// Effect settings overrides
    pub settings: Value,
    /// Stable id
    pub id: String,
}

impl Default for ScheduledEffectConfig {
    fn default() -> Self {
        Self {
            effect_name: String::new(),
            days_of_week: Vec::new(),
            start_hour: 0,
            start_minute: 0,
            end_hour: 24,
            end_minute: 60,
            settings: Value::Object(Map::new()),
            id: new_effect_id(),
        }
    }
}

impl ScheduledEffectConfig {
    /// Create an every-day, all-day entry for `effect_name`.
    pub fn new(effect_name: impl Into<String>) -> Self {
        Self {
            effect_name: effect_name.into(),
            days_of_week: vec![ALL_DAYS.to_string()],
            ..Self::default()
        }
    }

    /// Restrict the entry to `start..=end` (hour, minute).
    pub fn with_window(mut self, start: (u32, u32), end: (u32, u32)) -> Self {
        (self.start_hour, self.start_minute) = start;
        (self.end_hour, self.end_minute) = end;
        self
    }

    /// Restrict the entry to the given day names.
    pub fn with_days<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.days_of_week = days.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the entry lists `day` (an English weekday name) or `all`.
    pub fn runs_on(&self, day: &str) -> bool {
        self.days_of_week
            .iter()
            .any(|d| d.eq_ignore_ascii_case(day) || d.eq_ignore_ascii_case(ALL_DAYS))
    }

    /// Whether `hour:minute` lies inside the window, both ends inclusive.
    pub fn window_contains(&self, hour: u32, minute: u32) -> bool {
        let after_start =
            hour > self.start_hour || (hour == self.start_hour && minute >= self.start_minute);
        let before_end = hour < self.end_hour || (hour == self.end_hour && minute <= self.end_minute);
        after_start && before_end
    }

    /// Listed days that are neither a weekday name nor `all`.
    pub fn unknown_days(&self) -> Vec<&str> {
        self.days_of_week
            .iter()
            .filter(|d| {
                !d.eq_ignore_ascii_case(ALL_DAYS)
                    && !WEEKDAYS.iter().any(|w| d.eq_ignore_ascii_case(w))
            })
            .map(String::as_str)
            .collect()
    }

    /// Whether two entries can run on a common day.
    pub(crate) fn shares_day_with(&self, other: &ScheduledEffectConfig) -> bool {
        WEEKDAYS.iter().any(|day| self.runs_on(day) && other.runs_on(day))
    }

    pub(crate) fn start_minutes(&self) -> u32 {
        self.start_hour.saturating_mul(60).saturating_add(self.start_minute)
    }

    pub(crate) fn end_minutes(&self) -> u32 {
        self.end_hour.saturating_mul(60).saturating_add(self.end_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_defaults_from_minimal_json() -> Result<(), serde_json::Error> {
        let config: LocationConfig = serde_json::from_str(r#"{ "name": "porch" }"#)?;
        assert_eq!(config.frames_per_second, 21);
        assert_eq!(config.canvas_type, "Canvas1D");
        assert_eq!((config.width, config.height), (144, 1));
        assert!(config.is_api_enabled);
        assert!(config.controllers.is_empty());
        Ok(())
    }

    #[test]
    fn test_controller_defaults() -> Result<(), serde_json::Error> {
        let controller: ControllerConfig =
            serde_json::from_str(r#"{ "host": "10.0.0.5", "name": "rail" }"#)?;
        assert_eq!(controller.batch_size, 1);
        assert_eq!(controller.frames_per_buffer, 21);
        assert_eq!(controller.height, 1);
        assert!(!controller.use_compression);
        assert_eq!(controller.window(144), PixelWindow::new(0, 144, 1));
        Ok(())
    }

    #[test]
    fn test_zero_width_covers_rest_of_canvas() {
        let mut controller = ControllerConfig::new("10.0.0.5", "rail");
        controller.offset = 100;
        assert_eq!(controller.window(144), PixelWindow::new(100, 44, 1));
        controller.offset = 200;
        assert_eq!(controller.window(144).width, 0);
    }

    #[test]
    fn test_scheduled_defaults_cover_whole_day() -> Result<(), serde_json::Error> {
        let entry: ScheduledEffectConfig =
            serde_json::from_str(r#"{ "effectName": "Rainbow", "daysOfWeek": ["ALL"] }"#)?;
        assert_eq!((entry.end_hour, entry.end_minute), (24, 60));
        assert_eq!(entry.id.len(), 8);
        assert!(entry.runs_on("Thursday"));
        assert!(entry.window_contains(0, 0));
        assert!(entry.window_contains(23, 59));
        Ok(())
    }

    #[test]
    fn test_window_inclusive_at_both_bounds() {
        let entry = ScheduledEffectConfig::new("Rainbow").with_window((9, 0), (10, 0));
        assert!(entry.window_contains(9, 0));
        assert!(entry.window_contains(10, 0));
        assert!(!entry.window_contains(8, 59));
        assert!(!entry.window_contains(10, 1));
    }

    #[test]
    fn test_day_matching_is_case_insensitive() {
        let entry = ScheduledEffectConfig::new("Rainbow").with_days(["monday", "FRIDAY"]);
        assert!(entry.runs_on("Monday"));
        assert!(entry.runs_on("Friday"));
        assert!(!entry.runs_on("Sunday"));
        assert!(entry.unknown_days().is_empty());

        let bad = ScheduledEffectConfig::new("Rainbow").with_days(["Funday"]);
        assert_eq!(bad.unknown_days(), vec!["Funday"]);
    }

    #[test]
    fn test_effect_ids_are_hex() {
        let id = new_effect_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
