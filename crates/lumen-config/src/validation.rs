//! Validation of loaded site configuration.

use std::collections::HashSet;

use lumen_errors::ConfigError;
use tracing::warn;

use crate::model::LocationConfig;

/// Two schedule entries of one site that can both be active at once.
///
/// The render loop picks the first declared match, so the later entry only
/// runs outside the overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOverlap {
    /// Site name
    pub location: String,
    /// Id of the earlier entry (wins)
    pub first_id: String,
    /// Id of the later entry (shadowed)
    pub second_id: String,
}

/// Check one site.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first offending field.
pub fn validate_location(location: &LocationConfig) -> Result<(), ConfigError> {
    let name = location.name.as_str();
    if name.trim().is_empty() {
        return Err(ConfigError::invalid("<unnamed>", "name", "must not be empty"));
    }
    if location.frames_per_second == 0 {
        return Err(ConfigError::invalid(name, "framesPerSecond", "must be greater than zero"));
    }
    if location.width == 0 || location.height == 0 {
        return Err(ConfigError::invalid(
            name,
            "width/height",
            format!("canvas {}x{} has no pixels", location.width, location.height),
        ));
    }
    if location.canvas_type.trim().is_empty() {
        return Err(ConfigError::invalid(name, "canvasType", "must not be empty"));
    }

    let pixels = location.pixel_count();
    for (index, controller) in location.controllers.iter().enumerate() {
        let field = |f: &str| format!("controllers[{index}].{f}");
        if controller.host.trim().is_empty() {
            return Err(ConfigError::invalid(name, field("host"), "must not be empty"));
        }
        if controller.batch_size == 0 {
            return Err(ConfigError::invalid(name, field("batchSize"), "must be at least 1"));
        }
        let window = controller.window(location.width);
        if window.width == 0 || !window.fits(pixels) {
            return Err(ConfigError::invalid(
                name,
                field("offset/width/height"),
                format!(
                    "window {}+{}x{} exceeds canvas of {pixels} pixels",
                    window.offset, window.width, window.height
                ),
            ));
        }
    }

    for (index, entry) in location.scheduled_effects.iter().enumerate() {
        let field = |f: &str| format!("scheduledEffects[{index}].{f}");
        if entry.effect_name.trim().is_empty() {
            return Err(ConfigError::invalid(name, field("effectName"), "must not be empty"));
        }
        if entry.days_of_week.is_empty() {
            return Err(ConfigError::invalid(name, field("daysOfWeek"), "must list at least one day"));
        }
        if let Some(day) = entry.unknown_days().first() {
            return Err(ConfigError::invalid(
                name,
                field("daysOfWeek"),
                format!("unknown day {day:?}"),
            ));
        }
        if entry.start_hour > 24 || entry.end_hour > 24 {
            return Err(ConfigError::invalid(name, field("startHour/endHour"), "must be 0-24"));
        }
        if entry.start_minute > 60 || entry.end_minute > 60 {
            return Err(ConfigError::invalid(
                name,
                field("startMinute/endMinute"),
                "must be 0-60",
            ));
        }
        if entry.start_minutes() > entry.end_minutes() {
            return Err(ConfigError::invalid(name, field("window"), "ends before it starts"));
        }
    }
    Ok(())
}

/// Pairs of schedule entries in one site whose day sets and windows intersect.
pub fn find_schedule_overlaps(location: &LocationConfig) -> Vec<ScheduleOverlap> {
    let entries = &location.scheduled_effects;
    let mut overlaps = Vec::new();
    for (i, first) in entries.iter().enumerate() {
        for second in entries.iter().skip(i.saturating_add(1)) {
            let windows_meet = first.start_minutes() <= second.end_minutes()
                && second.start_minutes() <= first.end_minutes();
            if windows_meet && first.shares_day_with(second) {
                overlaps.push(ScheduleOverlap {
                    location: location.name.clone(),
                    first_id: first.id.clone(),
                    second_id: second.id.clone(),
                });
            }
        }
    }
    overlaps
}

/// Check every site and reject duplicate names.
///
/// Overlapping schedule windows are logged, not rejected.
pub fn validate_locations(locations: &[LocationConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for location in locations {
        validate_location(location)?;
        if !seen.insert(location.name.as_str()) {
            return Err(ConfigError::DuplicateLocation(location.name.clone()));
        }
        for overlap in find_schedule_overlaps(location) {
            warn!(
                location = %overlap.location,
                first = %overlap.first_id,
                second = %overlap.second_id,
                "Scheduled effects overlap; the first declared entry wins"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControllerConfig, ScheduledEffectConfig};

    fn site() -> LocationConfig {
        let mut location = LocationConfig::new("porch");
        location.controllers.push(ControllerConfig::new("10.0.0.5", "rail"));
        location
    }

    #[test]
    fn test_valid_site_passes() {
        assert!(validate_location(&site()).is_ok());
    }

    #[test]
    fn test_zero_fps_rejected() {
        let mut location = site();
        location.frames_per_second = 0;
        let err = validate_location(&location).err().map(|e| e.to_string());
        assert!(err.is_some_and(|msg| msg.contains("framesPerSecond")));
    }

    #[test]
    fn test_window_past_canvas_rejected() {
        let mut location = site();
        location.controllers[0].offset = 100;
        location.controllers[0].width = 50;
        assert!(matches!(
            validate_location(&location),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_window_exactly_filling_canvas_accepted() {
        let mut location = site();
        location.controllers[0].offset = 94;
        location.controllers[0].width = 50;
        assert!(validate_location(&location).is_ok());
    }

    #[test]
    fn test_zero_width_window_takes_rest_of_canvas() {
        let mut location = site();
        location.controllers[0].offset = 100;
        location.controllers[0].width = 0;
        assert!(validate_location(&location).is_ok());

        location.controllers[0].offset = location.width;
        assert!(matches!(
            validate_location(&location),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut location = site();
        location.controllers[0].host = "  ".into();
        assert!(validate_location(&location).is_err());
    }

    #[test]
    fn test_bad_schedule_fields_rejected() {
        let mut location = site();
        location
            .scheduled_effects
            .push(ScheduledEffectConfig::new("Rainbow").with_window((25, 0), (26, 0)));
        assert!(validate_location(&location).is_err());

        let mut location = site();
        location
            .scheduled_effects
            .push(ScheduledEffectConfig::new("Rainbow").with_window((12, 0), (11, 0)));
        assert!(validate_location(&location).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = validate_locations(&[site(), site()]);
        assert!(matches!(result, Err(ConfigError::DuplicateLocation(name)) if name == "porch"));
    }

    #[test]
    fn test_overlaps_detected_only_on_shared_days() {
        let mut location = site();
        location.scheduled_effects = vec![
            ScheduledEffectConfig::new("Rainbow")
                .with_days(["Monday"])
                .with_window((9, 0), (12, 0)),
            ScheduledEffectConfig::new("SolidColor")
                .with_days(["monday", "Tuesday"])
                .with_window((11, 30), (13, 0)),
            ScheduledEffectConfig::new("SolidColor")
                .with_days(["Sunday"])
                .with_window((9, 0), (12, 0)),
        ];
        let overlaps = find_schedule_overlaps(&location);
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].first_id, location.scheduled_effects[0].id);
        assert_eq!(overlaps[0].second_id, location.scheduled_effects[1].id);
    }
}
