//! Prelude module for convenient error handling imports.

pub use crate::{
    Result,
    common::{ErrorCategory, ErrorSeverity, LumenError},
    config::ConfigError,
    control::ControlError,
    effect::EffectError,
    transport::TransportError,
};
