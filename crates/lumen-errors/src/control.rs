//! Control-plane rejection types.
//!
//! Every control-plane operation (enqueue, force, clear, settings) returns one
//! of these when it refuses a request. None of them are fatal to the server.

use crate::common::ErrorSeverity;

/// Rejections returned to control-plane callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// No location with the given name is loaded
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// The location exists but refuses API access
    #[error("Location {0} is not enabled for API access")]
    ApiNotEnabled(String),

    /// No effect factory is registered under the name
    #[error("Effect not found: {0}")]
    EffectNotFound(String),

    /// No active or queued effect carries the id
    #[error("No effect with id {id} on location {location}")]
    EffectIdNotFound {
        /// Location name
        location: String,
        /// Effect instance id
        id: String,
    },

    /// An effect with the same id is already queued or running
    #[error("Effect id {id} is already in use on location {location}")]
    DuplicateEffectId {
        /// Location name
        location: String,
        /// Effect instance id
        id: String,
    },

    /// The effect queue is at capacity
    #[error("Effect queue for location {location} is full ({capacity} entries)")]
    QueueFull {
        /// Location name
        location: String,
        /// Queue capacity
        capacity: usize,
    },

    /// The supplied settings could not be applied to the effect
    #[error("Invalid settings for effect {effect}: {reason}")]
    InvalidSettings {
        /// Effect name
        effect: String,
        /// Reason the settings were refused
        reason: String,
    },

    /// The location has no canvas to size new effects against
    #[error("Location {0} has no canvas")]
    CanvasUnavailable(String),
}

impl ControlError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ControlError::LocationNotFound(_)
            | ControlError::EffectNotFound(_)
            | ControlError::EffectIdNotFound { .. }
            | ControlError::DuplicateEffectId { .. } => ErrorSeverity::Info,
            ControlError::ApiNotEnabled(_)
            | ControlError::QueueFull { .. }
            | ControlError::InvalidSettings { .. } => ErrorSeverity::Warning,
            ControlError::CanvasUnavailable(_) => ErrorSeverity::Error,
        }
    }

    /// Check if the caller may succeed by retrying the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ControlError::QueueFull { .. } | ControlError::CanvasUnavailable(_)
        )
    }

    /// Create a location-not-found error.
    pub fn location_not_found(location: impl Into<String>) -> Self {
        ControlError::LocationNotFound(location.into())
    }

    /// Create an effect-not-found error.
    pub fn effect_not_found(effect: impl Into<String>) -> Self {
        ControlError::EffectNotFound(effect.into())
    }

    /// Create an effect-id-not-found error.
    pub fn effect_id_not_found(location: impl Into<String>, id: impl Into<String>) -> Self {
        ControlError::EffectIdNotFound {
            location: location.into(),
            id: id.into(),
        }
    }

    /// Create an invalid-settings error.
    pub fn invalid_settings(effect: impl Into<String>, reason: impl Into<String>) -> Self {
        ControlError::InvalidSettings {
            effect: effect.into(),
            reason: reason.into(),
        }
    }
}
