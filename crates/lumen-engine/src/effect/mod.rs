//! Effect contract and settings handling.
//!
//! An effect is a small state machine driven by its site's render loop:
//! `start` stamps it, `update` advances it by the tick delta, `draw` paints
//! the canvas. It ends when its lifetime elapses or when a caller requests
//! the end. Settings are plain JSON objects merged over the effect's current
//! values, so callers only need to send the fields they change.

pub mod builtin;
pub mod registry;

use std::time::{Duration, Instant};

use lumen_errors::EffectError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::canvas::Canvas;

pub use builtin::{Rainbow, RainbowSettings, SolidColor, SolidColorSettings};
pub use registry::{EffectFactory, EffectRegistry};

/// Bookkeeping shared by every effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectState {
    id: String,
    lifetime: Option<Duration>,
    started: Option<Instant>,
    end_requested: bool,
}

impl EffectState {
    /// New, not yet started state. A `None` lifetime runs until ended.
    pub fn new(id: impl Into<String>, lifetime: Option<Duration>) -> Self {
        Self {
            id: id.into(),
            lifetime,
            started: None,
            end_requested: false,
        }
    }

    /// Instance id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared lifetime.
    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// Replace the lifetime; applies from the current start time.
    pub fn set_lifetime(&mut self, lifetime: Option<Duration>) {
        self.lifetime = lifetime;
    }

    /// When the effect was last (re)started.
    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    /// Stamp the start time and clear any pending end request.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.end_requested = false;
    }

    /// Ask the effect to end at the next lifetime check.
    pub fn request_end(&mut self) {
        self.end_requested = true;
    }

    /// Whether the effect should be replaced as of `now`.
    pub fn is_over_at(&self, now: Instant) -> bool {
        if self.end_requested {
            return true;
        }
        match (self.lifetime, self.started) {
            (Some(lifetime), Some(started)) => now.saturating_duration_since(started) >= lifetime,
            _ => false,
        }
    }

    /// Time since the effect started, zero before it has.
    pub fn running_time(&self, now: Instant) -> Duration {
        self.started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }
}

/// Convert a `lifetime` setting in seconds to a duration; zero or negative
/// means forever.
pub fn lifetime_from_secs(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

/// A renderable effect.
///
/// Implementations hold an [`EffectState`] and a serde settings struct.
/// Both `update` and `draw` may fail; the render loop ends a failing effect
/// and keeps running.
pub trait Effect: Send {
    /// Registered factory name.
    fn name(&self) -> &str;

    /// Shared bookkeeping.
    fn state(&self) -> &EffectState;

    /// Shared bookkeeping, mutable.
    fn state_mut(&mut self) -> &mut EffectState;

    /// Advance internal state by `delta`.
    fn update(&mut self, _delta: Duration) -> Result<(), EffectError> {
        Ok(())
    }

    /// Paint the current frame.
    fn draw(&mut self, canvas: &mut dyn Canvas, delta: Duration) -> Result<(), EffectError>;

    /// Current settings as a JSON object.
    fn settings(&self) -> Value;

    /// Merge `overrides` over the current settings.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::InvalidSettings`] and leaves the settings
    /// unchanged if the merged result is rejected.
    fn apply_settings(&mut self, overrides: &Value) -> Result<(), EffectError>;

    /// Instance id.
    fn id(&self) -> &str {
        self.state().id()
    }

    /// Stamp the start time.
    fn start(&mut self, now: Instant) {
        self.state_mut().start(now);
    }

    /// Whether the effect should be replaced now.
    fn is_lifetime_over(&self) -> bool {
        self.state().is_over_at(Instant::now())
    }

    /// Ask the effect to end.
    fn request_end(&mut self) {
        self.state_mut().request_end();
    }
}

/// Where the render loop got an effect from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EffectOrigin {
    /// Pinned forced override
    Forced,
    /// Taken from the FIFO effect queue
    Queued,
    /// Picked from the schedule
    Scheduled {
        /// Schedule entry id
        entry_id: String,
    },
}

/// Shallow-merge `overrides` onto `base`.
///
/// Keys present in `overrides` replace those in `base`; `null` values keep
/// the base value.
///
/// # Errors
///
/// Returns a reason string if either side is not a JSON object. A `null`
/// override is treated as an empty object.
pub fn merge_settings(base: &Value, overrides: &Value) -> Result<Value, String> {
    let Value::Object(base) = base else {
        return Err("current settings are not an object".to_string());
    };
    let overrides = match overrides {
        Value::Null => return Ok(Value::Object(base.clone())),
        Value::Object(map) => map,
        other => return Err(format!("settings must be an object, got {}", kind_of(other))),
    };

    let mut merged: Map<String, Value> = base.clone();
    for (key, value) in overrides {
        if !value.is_null() {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(merged))
}

/// Merge `overrides` over a typed settings struct and deserialize the result.
///
/// # Errors
///
/// Returns [`EffectError::InvalidSettings`] for non-object overrides and for
/// values of the wrong type.
pub fn merge_typed<T>(effect: &str, current: &T, overrides: &Value) -> Result<T, EffectError>
where
    T: Serialize + DeserializeOwned,
{
    let base = serde_json::to_value(current)
        .map_err(|e| EffectError::invalid_settings(effect, e.to_string()))?;
    let merged = merge_settings(&base, overrides)
        .map_err(|reason| EffectError::invalid_settings(effect, reason))?;
    serde_json::from_value(merged).map_err(|e| EffectError::invalid_settings(effect, e.to_string()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
