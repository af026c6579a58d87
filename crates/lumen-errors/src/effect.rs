//! Effect fault types.
//!
//! Effects report these from settings application and from per-tick
//! update/draw. The render loop isolates every one of them: the offending
//! effect is ended and the loop keeps running.

use crate::common::ErrorSeverity;

/// Effect faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// Settings payload was rejected
    #[error("Invalid settings for {effect}: {reason}")]
    InvalidSettings {
        /// Effect name
        effect: String,
        /// Rejection reason
        reason: String,
    },

    /// The effect failed while updating or drawing
    #[error("Effect {effect} failed while rendering: {reason}")]
    RenderFault {
        /// Effect name
        effect: String,
        /// Failure description
        reason: String,
    },

    /// The effect panicked while updating or drawing
    #[error("Effect {0} panicked while rendering")]
    Panicked(String),
}

impl EffectError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EffectError::InvalidSettings { .. } => ErrorSeverity::Warning,
            EffectError::RenderFault { .. } | EffectError::Panicked(_) => ErrorSeverity::Error,
        }
    }

    /// Never retried: a failed effect is dropped and a fresh one selected.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Create an invalid-settings error.
    pub fn invalid_settings(effect: impl Into<String>, reason: impl Into<String>) -> Self {
        EffectError::InvalidSettings {
            effect: effect.into(),
            reason: reason.into(),
        }
    }

    /// Create a render fault.
    pub fn render_fault(effect: impl Into<String>, reason: impl Into<String>) -> Self {
        EffectError::RenderFault {
            effect: effect.into(),
            reason: reason.into(),
        }
    }
}
