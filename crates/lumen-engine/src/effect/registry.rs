//! Name to effect constructor table.

use std::collections::HashMap;
use std::fmt;

use lumen_config::new_effect_id;
use lumen_errors::ControlError;
use serde_json::Value;

use super::{Effect, Rainbow, SolidColor};
use crate::canvas::CanvasInfo;

/// Builds a fresh effect with the given instance id, sized for a canvas.
pub type EffectFactory = Box<dyn Fn(String, CanvasInfo) -> Box<dyn Effect> + Send + Sync>;

/// Effect constructors, registered once at startup.
pub struct EffectRegistry {
    factories: HashMap<String, EffectFactory>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.names())
            .finish()
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EffectRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the shipped effects.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SolidColor::NAME, |id, _| Box::new(SolidColor::new(id)));
        registry.register(Rainbow::NAME, |id, _| Box::new(Rainbow::new(id)));
        registry
    }

    /// Register a factory under `name`. The first registration wins;
    /// returns `false` if the name was already taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(String, CanvasInfo) -> Box<dyn Effect> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return false;
        }
        self.factories.insert(name, Box::new(factory));
        true
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build an effect and apply `settings` over its defaults.
    ///
    /// A missing `id` gets a fresh 8 hex character id.
    ///
    /// # Errors
    ///
    /// [`ControlError::EffectNotFound`] for an unknown name and
    /// [`ControlError::InvalidSettings`] when the settings are rejected.
    pub fn create(
        &self,
        name: &str,
        canvas: CanvasInfo,
        id: Option<String>,
        settings: &Value,
    ) -> Result<Box<dyn Effect>, ControlError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ControlError::effect_not_found(name))?;
        let id = id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_effect_id);
        let mut effect = factory(id, canvas);
        effect
            .apply_settings(settings)
            .map_err(|e| ControlError::invalid_settings(name, e.to_string()))?;
        Ok(effect)
    }
}
