//! Control-plane facade over every loaded site.

use std::sync::Arc;

use lumen_config::LocationConfig;
use lumen_errors::{ControlError, LumenError};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::canvas::CanvasRegistry;
use crate::controller::SocketPool;
use crate::effect::{Effect, EffectRegistry};
use crate::location::{EffectSummary, Location, LocationStatus};
use crate::schedule::{SystemClock, WallClock};

/// Request to build an effect by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRequest {
    /// Registered effect name
    pub effect: String,
    /// Settings overrides
    #[serde(default)]
    pub settings: Value,
    /// Instance id; generated when absent
    #[serde(default)]
    pub id: Option<String>,
}

impl EffectRequest {
    /// Request `effect` with default settings and a generated id.
    pub fn new(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            settings: Value::Null,
            id: None,
        }
    }

    /// Set the settings overrides.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Set the instance id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Every site of the server, plus the shared effect and canvas tables.
///
/// Lookups by name only see sites with the API enabled;
/// [`all_locations`](Self::all_locations) sees every site.
#[derive(Debug)]
pub struct LocationRegistry {
    locations: Vec<Location>,
    effects: Arc<EffectRegistry>,
}

impl LocationRegistry {
    /// Build sites with the built-in effects and canvases, the system clock
    /// and a fresh socket pool.
    pub fn new(configs: Vec<LocationConfig>) -> Self {
        Self::with_parts(
            configs,
            Arc::new(EffectRegistry::with_builtins()),
            Arc::new(CanvasRegistry::with_builtins()),
            Arc::new(SocketPool::new()),
            Arc::new(SystemClock),
        )
    }

    /// Build sites from explicit parts.
    pub fn with_parts(
        configs: Vec<LocationConfig>,
        effects: Arc<EffectRegistry>,
        canvases: Arc<CanvasRegistry>,
        pool: Arc<SocketPool>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        for config in &configs {
            for entry in &config.scheduled_effects {
                if !effects.contains(&entry.effect_name) {
                    warn!(
                        location = %config.name,
                        effect = %entry.effect_name,
                        "Scheduled effect is not registered"
                    );
                }
            }
        }
        let locations = configs
            .into_iter()
            .map(|config| {
                Location::new(
                    config,
                    Arc::clone(&effects),
                    Arc::clone(&canvases),
                    Arc::clone(&pool),
                    Arc::clone(&clock),
                )
            })
            .collect();
        Self { locations, effects }
    }

    /// Effect constructors.
    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Start every site.
    ///
    /// # Errors
    ///
    /// Stops the sites already started and returns the first spawn failure.
    pub fn start_all(&self) -> Result<(), LumenError> {
        for location in &self.locations {
            if let Err(e) = location.start() {
                self.stop_all();
                return Err(e);
            }
        }
        info!(locations = self.locations.len(), "All locations started");
        Ok(())
    }

    /// Stop every site and its controller workers.
    pub fn stop_all(&self) {
        for location in &self.locations {
            location.stop();
        }
    }

    /// Sites with the API enabled.
    pub fn locations(&self) -> Vec<&Location> {
        self.locations.iter().filter(|l| l.is_api_enabled()).collect()
    }

    /// Every site.
    pub fn all_locations(&self) -> &[Location] {
        &self.locations
    }

    /// Site by name.
    ///
    /// # Errors
    ///
    /// [`ControlError::LocationNotFound`] for an unknown name and
    /// [`ControlError::ApiNotEnabled`] for a site closed to the API.
    pub fn location(&self, name: &str) -> Result<&Location, ControlError> {
        let location = self
            .locations
            .iter()
            .find(|l| l.name() == name)
            .ok_or_else(|| ControlError::location_not_found(name))?;
        if !location.is_api_enabled() {
            return Err(ControlError::ApiNotEnabled(name.to_string()));
        }
        Ok(location)
    }

    fn build(&self, location: &Location, request: EffectRequest) -> Result<Box<dyn Effect>, ControlError> {
        self.effects.create(
            &request.effect,
            location.canvas_info(),
            request.id,
            &request.settings,
        )
    }

    /// Build an effect and append it to a site's queue. Returns its id.
    ///
    /// # Errors
    ///
    /// Lookup, creation and queue rejections as [`ControlError`].
    pub fn enqueue_effect(&self, location: &str, request: EffectRequest) -> Result<String, ControlError> {
        let location = self.location(location)?;
        let effect = self.build(location, request)?;
        let id = effect.id().to_string();
        location.enqueue_effect(effect)?;
        Ok(id)
    }

    /// Force an effect on a site, or clear the override with `None`.
    /// Returns the forced effect's id.
    ///
    /// # Errors
    ///
    /// Lookup and creation rejections as [`ControlError`].
    pub fn set_forced_effect(
        &self,
        location: &str,
        request: Option<EffectRequest>,
    ) -> Result<Option<String>, ControlError> {
        let location = self.location(location)?;
        let Some(request) = request else {
            location.set_forced_effect(None)?;
            return Ok(None);
        };
        let effect = self.build(location, request)?;
        let id = effect.id().to_string();
        location.set_forced_effect(Some(effect))?;
        Ok(Some(id))
    }

    /// Clear a site's forced override.
    ///
    /// # Errors
    ///
    /// Lookup rejections as [`ControlError`].
    pub fn clear_forced_effect(&self, location: &str) -> Result<bool, ControlError> {
        Ok(self.location(location)?.clear_forced_effect())
    }

    /// End a site's active effect.
    ///
    /// # Errors
    ///
    /// Lookup rejections as [`ControlError`].
    pub fn clear_active_effect(&self, location: &str) -> Result<bool, ControlError> {
        Ok(self.location(location)?.clear_active_effect())
    }

    /// Empty a site's queue, returning how many effects were removed.
    ///
    /// # Errors
    ///
    /// Lookup rejections as [`ControlError`].
    pub fn clear_queue(&self, location: &str) -> Result<usize, ControlError> {
        Ok(self.location(location)?.clear_queue())
    }

    /// A site's queued effects.
    ///
    /// # Errors
    ///
    /// Lookup rejections as [`ControlError`].
    pub fn effect_queue(&self, location: &str) -> Result<Vec<EffectSummary>, ControlError> {
        Ok(self.location(location)?.effect_queue())
    }

    /// A site's active effect.
    ///
    /// # Errors
    ///
    /// Lookup rejections as [`ControlError`].
    pub fn active_effect(&self, location: &str) -> Result<Option<EffectSummary>, ControlError> {
        Ok(self.location(location)?.active_effect())
    }

    /// Settings of an effect on a site.
    ///
    /// # Errors
    ///
    /// Lookup rejections and unknown ids as [`ControlError`].
    pub fn effect_settings(&self, location: &str, id: &str) -> Result<Value, ControlError> {
        self.location(location)?.effect_settings(id)
    }

    /// Merge settings into an effect on a site.
    ///
    /// # Errors
    ///
    /// Lookup rejections, unknown ids and rejected settings as
    /// [`ControlError`].
    pub fn set_effect_settings(
        &self,
        location: &str,
        id: &str,
        overrides: &Value,
    ) -> Result<Value, ControlError> {
        self.location(location)?.set_effect_settings(id, overrides)
    }

    /// Status of every site, API-enabled or not.
    pub fn status(&self) -> Vec<LocationStatus> {
        self.locations.iter().map(Location::status).collect()
    }
}

impl Drop for LocationRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
