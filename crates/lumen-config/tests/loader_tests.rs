//! Directory loading tests.

use lumen_config::{
    ControllerConfig, LocationConfig, ScheduledEffectConfig, load_location_file, load_locations,
    save_location,
};
use lumen_errors::ConfigError;
use std::fs;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const PORCH: &str = r#"{
  "name": "porch",
  "framesPerSecond": 30,
  "width": 300,
  "controllers": [
    { "host": "10.0.0.21", "name": "left", "width": 150 },
    { "host": "10.0.0.22:50000", "name": "right", "offset": 150, "width": 150,
      "reversed": true, "useCompression": true, "batchSize": 3 }
  ],
  "scheduledEffects": [
    { "effectName": "Rainbow", "daysOfWeek": ["all"], "startHour": 18, "endHour": 23,
      "settings": { "speed": 2.0 }, "id": "evening1" }
  ]
}"#;

#[test]
fn test_load_directory_in_name_order() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("b_porch.json"), PORCH)?;
    fs::write(dir.path().join("a_roof.json"), r#"{ "name": "roof" }"#)?;
    fs::write(dir.path().join("notes.txt"), "ignored")?;

    let locations = load_locations(dir.path())?;
    let names: Vec<_> = locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["roof", "porch"]);

    let porch = &locations[1];
    assert_eq!(porch.frames_per_second, 30);
    assert_eq!(porch.controllers.len(), 2);
    assert!(porch.controllers[1].reversed);
    assert_eq!(porch.controllers[1].batch_size, 3);
    assert_eq!(porch.scheduled_effects[0].id, "evening1");
    assert_eq!(porch.scheduled_effects[0].end_minute, 60);
    Ok(())
}

#[test]
fn test_malformed_file_names_path() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json")?;

    match load_location_file(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_duplicate_names_across_files_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("one.json"), r#"{ "name": "roof" }"#)?;
    fs::write(dir.path().join("two.json"), r#"{ "name": "roof" }"#)?;
    assert!(matches!(
        load_locations(dir.path()),
        Err(ConfigError::DuplicateLocation(_))
    ));
    Ok(())
}

#[test]
fn test_missing_directory_is_io_error() {
    let result = load_locations(std::path::Path::new("/definitely/not/here"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_saved_location_loads_back() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut location = LocationConfig::new("garden");
    location.controllers.push(ControllerConfig::new("garden.local", "hedge"));
    location
        .scheduled_effects
        .push(ScheduledEffectConfig::new("SolidColor").with_days(["Saturday", "Sunday"]));

    let path = save_location(dir.path(), &location)?;
    assert!(path.ends_with("garden.json"));
    assert_eq!(load_location_file(&path)?, location);
    Ok(())
}
