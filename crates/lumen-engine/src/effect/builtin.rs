//! Effects shipped with the server.

use std::time::Duration;

use lumen_errors::EffectError;
use lumen_wire::LedColor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Effect, EffectState, lifetime_from_secs, merge_typed};
use crate::canvas::Canvas;

/// Settings for [`SolidColor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolidColorSettings {
    /// Seconds to run, 0 for forever
    pub lifetime: f64,
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
}

impl Default for SolidColorSettings {
    fn default() -> Self {
        Self {
            lifetime: 0.0,
            red: 255,
            green: 255,
            blue: 255,
        }
    }
}

/// Fills the canvas with one color.
#[derive(Debug, Clone)]
pub struct SolidColor {
    state: EffectState,
    settings: SolidColorSettings,
}

impl SolidColor {
    /// Factory name.
    pub const NAME: &'static str = "SolidColor";

    /// Create with default settings.
    pub fn new(id: impl Into<String>) -> Self {
        let settings = SolidColorSettings::default();
        Self {
            state: EffectState::new(id, lifetime_from_secs(settings.lifetime)),
            settings,
        }
    }

    fn color(&self) -> LedColor {
        LedColor::new(self.settings.red, self.settings.green, self.settings.blue)
    }
}

impl Effect for SolidColor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> &EffectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EffectState {
        &mut self.state
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, _delta: Duration) -> Result<(), EffectError> {
        canvas.fill(self.color());
        Ok(())
    }

    fn settings(&self) -> Value {
        serde_json::to_value(&self.settings).unwrap_or(Value::Null)
    }

    fn apply_settings(&mut self, overrides: &Value) -> Result<(), EffectError> {
        let settings = merge_typed(Self::NAME, &self.settings, overrides)?;
        self.state.set_lifetime(lifetime_from_secs(settings.lifetime));
        self.settings = settings;
        Ok(())
    }
}

/// Settings for [`Rainbow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RainbowSettings {
    /// Seconds to run, 0 for forever
    pub lifetime: f64,
    /// Hue rotation in degrees per second
    pub speed: f64,
    /// Hue step between neighbouring pixels, in degrees
    pub density: f64,
    /// Output scale, 0.0-1.0
    pub brightness: f64,
}

impl Default for RainbowSettings {
    fn default() -> Self {
        Self {
            lifetime: 0.0,
            speed: 90.0,
            density: 4.0,
            brightness: 1.0,
        }
    }
}

impl RainbowSettings {
    fn validate(&self) -> Result<(), EffectError> {
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(EffectError::invalid_settings(
                Rainbow::NAME,
                format!("brightness {} is outside 0.0-1.0", self.brightness),
            ));
        }
        if !self.speed.is_finite() || !self.density.is_finite() {
            return Err(EffectError::invalid_settings(
                Rainbow::NAME,
                "speed and density must be finite",
            ));
        }
        Ok(())
    }
}

/// Scrolling hue gradient.
#[derive(Debug, Clone)]
pub struct Rainbow {
    state: EffectState,
    settings: RainbowSettings,
    hue: f64,
}

impl Rainbow {
    /// Factory name.
    pub const NAME: &'static str = "Rainbow";

    /// Create with default settings.
    pub fn new(id: impl Into<String>) -> Self {
        let settings = RainbowSettings::default();
        Self {
            state: EffectState::new(id, lifetime_from_secs(settings.lifetime)),
            settings,
            hue: 0.0,
        }
    }
}

impl Effect for Rainbow {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> &EffectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EffectState {
        &mut self.state
    }

    fn update(&mut self, delta: Duration) -> Result<(), EffectError> {
        self.hue = (self.hue + self.settings.speed * delta.as_secs_f64()).rem_euclid(360.0);
        Ok(())
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, _delta: Duration) -> Result<(), EffectError> {
        let (hue, density, brightness) = (self.hue, self.settings.density, self.settings.brightness);
        for (i, pixel) in canvas.pixels_mut().iter_mut().enumerate() {
            *pixel = hsv_to_rgb(hue + density * i as f64, 1.0, brightness);
        }
        Ok(())
    }

    fn settings(&self) -> Value {
        serde_json::to_value(&self.settings).unwrap_or(Value::Null)
    }

    fn apply_settings(&mut self, overrides: &Value) -> Result<(), EffectError> {
        let settings = merge_typed(Self::NAME, &self.settings, overrides)?;
        settings.validate()?;
        self.state.set_lifetime(lifetime_from_secs(settings.lifetime));
        self.settings = settings;
        Ok(())
    }
}

/// Convert hue (degrees, any range), saturation and value (0.0-1.0) to RGB.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> LedColor {
    let h = hue.rem_euclid(360.0) / 60.0;
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let channel = |f: f64| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    LedColor::new(channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelCanvas;
    use serde_json::json;

    fn strip(len: u32) -> PixelCanvas {
        let mut canvas = PixelCanvas::strip();
        if let Err(e) = canvas.initialize(len, 1) {
            panic!("canvas init failed: {e}");
        }
        canvas
    }

    #[test]
    fn test_solid_color_fills_canvas() -> Result<(), EffectError> {
        let mut effect = SolidColor::new("id1");
        effect.apply_settings(&json!({"red": 10, "green": 20, "blue": 30}))?;
        let mut canvas = strip(5);
        effect.draw(&mut canvas, Duration::from_millis(50))?;
        assert!(canvas.pixels().iter().all(|p| *p == LedColor::new(10, 20, 30)));
        Ok(())
    }

    #[test]
    fn test_partial_settings_merge() -> Result<(), EffectError> {
        let mut effect = SolidColor::new("id1");
        effect.apply_settings(&json!({"blue": 0}))?;
        assert_eq!(
            effect.settings(),
            json!({"lifetime": 0.0, "red": 255, "green": 255, "blue": 0})
        );
        Ok(())
    }

    #[test]
    fn test_lifetime_setting_applies() -> Result<(), EffectError> {
        let mut effect = SolidColor::new("id1");
        assert_eq!(effect.state().lifetime(), None);
        effect.apply_settings(&json!({"lifetime": 5}))?;
        assert_eq!(effect.state().lifetime(), Some(Duration::from_secs(5)));
        Ok(())
    }

    #[test]
    fn test_rainbow_rejects_bad_brightness_and_keeps_settings() {
        let mut effect = Rainbow::new("r");
        let before = effect.settings();
        let result = effect.apply_settings(&json!({"brightness": 3.0}));
        assert!(matches!(result, Err(EffectError::InvalidSettings { .. })));
        assert_eq!(effect.settings(), before);
    }

    #[test]
    fn test_rainbow_moves_over_time() -> Result<(), EffectError> {
        let mut effect = Rainbow::new("r");
        let mut canvas = strip(8);
        effect.draw(&mut canvas, Duration::ZERO)?;
        let first = canvas.pixels().to_vec();
        effect.update(Duration::from_millis(500))?;
        effect.draw(&mut canvas, Duration::from_millis(500))?;
        assert_ne!(first, canvas.pixels());
        Ok(())
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), LedColor::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), LedColor::new(0, 255, 0));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), LedColor::new(0, 0, 255));
        assert_eq!(hsv_to_rgb(360.0, 1.0, 1.0), LedColor::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(90.0, 1.0, 0.0), LedColor::BLACK);
    }
}
