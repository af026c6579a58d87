//! Control-plane lookups and rejections.

use lumen_config::{ControllerConfig, LocationConfig};
use lumen_engine::{EffectRequest, LocationRegistry};
use lumen_errors::ControlError;
use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn sites() -> LocationRegistry {
    let mut closed = LocationConfig::new("garage");
    closed.is_api_enabled = false;
    let mut porch = LocationConfig::new("porch");
    porch.controllers.push(ControllerConfig::new("127.0.0.1:9", "rail"));
    LocationRegistry::new(vec![porch, closed])
}

#[test]
fn test_lookup_rejections() {
    let sites = sites();
    assert!(matches!(
        sites.location("attic"),
        Err(ControlError::LocationNotFound(name)) if name == "attic"
    ));
    assert!(matches!(
        sites.location("garage"),
        Err(ControlError::ApiNotEnabled(name)) if name == "garage"
    ));
    let names: Vec<&str> = sites.locations().iter().map(|l| l.name()).collect();
    assert_eq!(names, vec!["porch"]);
    assert_eq!(sites.all_locations().len(), 2);
}

#[test]
fn test_closed_site_refuses_control_calls() {
    let sites = sites();
    let result = sites.enqueue_effect("garage", EffectRequest::new("Rainbow"));
    assert!(matches!(result, Err(ControlError::ApiNotEnabled(_))));
    assert!(sites.clear_queue("garage").is_err());
}

#[test]
fn test_unknown_effect_and_bad_settings() {
    let sites = sites();
    assert!(matches!(
        sites.enqueue_effect("porch", EffectRequest::new("Plasma")),
        Err(ControlError::EffectNotFound(_))
    ));
    assert!(matches!(
        sites.enqueue_effect(
            "porch",
            EffectRequest::new("Rainbow").with_settings(json!({"brightness": 2.0}))
        ),
        Err(ControlError::InvalidSettings { .. })
    ));
    assert!(sites.effect_queue("porch").is_ok_and(|q| q.is_empty()));
}

#[test]
fn test_enqueue_returns_generated_id() -> TestResult {
    let sites = sites();
    let id = sites.enqueue_effect("porch", EffectRequest::new("SolidColor"))?;
    assert_eq!(id.len(), 8);
    let queue = sites.effect_queue("porch")?;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, id);
    assert_eq!(queue[0].name, "SolidColor");
    Ok(())
}

#[test]
fn test_duplicate_id_rejected() -> TestResult {
    let sites = sites();
    sites.enqueue_effect("porch", EffectRequest::new("SolidColor").with_id("x"))?;
    let again = sites.enqueue_effect("porch", EffectRequest::new("Rainbow").with_id("x"));
    assert!(matches!(again, Err(ControlError::DuplicateEffectId { .. })));
    Ok(())
}

#[test]
fn test_settings_round_trip_through_registry() -> TestResult {
    let sites = sites();
    let id = sites.enqueue_effect(
        "porch",
        EffectRequest::new("Rainbow").with_settings(json!({"speed": 30.0})),
    )?;
    assert_eq!(sites.effect_settings("porch", &id)?.get("speed"), Some(&json!(30.0)));

    let updated = sites.set_effect_settings("porch", &id, &json!({"density": 8.0}))?;
    assert_eq!(updated.get("speed"), Some(&json!(30.0)));
    assert_eq!(updated.get("density"), Some(&json!(8.0)));

    let rejected = sites.set_effect_settings("porch", &id, &json!({"brightness": -1.0}));
    assert!(matches!(rejected, Err(ControlError::InvalidSettings { .. })));
    assert!(matches!(
        sites.effect_settings("porch", "nope"),
        Err(ControlError::EffectIdNotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_clear_queue_counts() -> TestResult {
    let sites = sites();
    for _ in 0..3 {
        sites.enqueue_effect("porch", EffectRequest::new("SolidColor"))?;
    }
    assert_eq!(sites.clear_queue("porch")?, 3);
    assert_eq!(sites.clear_queue("porch")?, 0);
    assert!(!sites.clear_forced_effect("porch")?);
    assert!(!sites.clear_active_effect("porch")?);
    assert_eq!(sites.active_effect("porch")?, None);
    Ok(())
}

#[test]
fn test_request_parses_from_json() -> TestResult {
    let request: EffectRequest =
        serde_json::from_value(json!({"effect": "Rainbow", "settings": {"speed": 5}}))?;
    assert_eq!(request.effect, "Rainbow");
    assert_eq!(request.id, None);

    let bare: EffectRequest = serde_json::from_value(json!({"effect": "SolidColor"}))?;
    assert_eq!(bare.settings, Value::Null);
    Ok(())
}

#[test]
fn test_status_serializes_camel_case() -> TestResult {
    let sites = sites();
    let status = serde_json::to_value(sites.status())?;
    let porch = &status[0];
    assert_eq!(porch["name"], "porch");
    assert_eq!(porch["framesPerSecond"], 21);
    assert_eq!(porch["queueLength"], 0);
    assert_eq!(porch["running"], false);
    assert_eq!(porch["controllers"][0]["host"], "127.0.0.1:9");
    assert_eq!(porch["controllers"][0]["connected"], false);
    Ok(())
}
