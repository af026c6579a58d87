//! Centralized error types for Lumen
//!
//! This crate provides a unified error handling system for the Lumen server,
//! covering the control plane, the render loop and the controller transport.
//!
//! # Architecture
//!
//! - [`common`]: Top-level error type, classification and context helpers
//! - [`control`]: Rejections returned to control-plane callers
//! - [`effect`]: Faults raised by effects during settings or rendering
//! - [`transport`]: Controller socket and network faults
//! - [`config`]: Site configuration loading and validation errors
//!
//! # Example
//!
//! ```
//! use lumen_errors::prelude::*;
//!
//! fn lookup(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(ControlError::location_not_found(name).into());
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod common;
pub mod config;
pub mod control;
pub mod effect;
pub mod prelude;
pub mod transport;

pub use common::{ErrorCategory, ErrorSeverity, LumenError};
pub use config::ConfigError;
pub use control::ControlError;
pub use effect::EffectError;
pub use transport::TransportError;

/// A specialized `Result` type for Lumen operations.
pub type Result<T> = std::result::Result<T, LumenError>;
