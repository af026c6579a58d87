//! Top-level error and the classification shared by every Lumen error enum.

use core::fmt;

use crate::{ConfigError, ControlError, EffectError, TransportError};

/// Any error a Lumen crate can surface.
#[derive(Debug, thiserror::Error)]
pub enum LumenError {
    /// Control-plane rejections
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Effect faults
    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    /// Controller transport faults
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Thread spawn and other OS-level failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LumenError {
    /// Area of the server the error came from.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Control(_) => ErrorCategory::Control,
            Self::Effect(_) => ErrorCategory::Effect,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Config(_) => ErrorCategory::Config,
            Self::Io(_) => ErrorCategory::IO,
        }
    }

    /// Severity, delegated to the wrapped error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Control(e) => e.severity(),
            Self::Effect(e) => e.severity(),
            Self::Transport(e) => e.severity(),
            Self::Config(e) => e.severity(),
            Self::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Whether the server keeps running after this error.
    ///
    /// Only configuration errors are critical; they stop the daemon from loading.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }
}

/// Area of the server an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Control-plane rejections
    Control = 0,
    /// Effect faults
    Effect = 1,
    /// Controller transport faults
    Transport = 2,
    /// Site configuration
    Config = 3,
    /// Operating system I/O
    IO = 4,
}

impl ErrorCategory {
    /// Short label used as a structured log field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Effect => "effect",
            Self::Transport => "transport",
            Self::Config => "config",
            Self::IO => "io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How loudly an error should be reported. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Expected rejection, reported to the caller only
    Info = 0,
    /// Degraded streaming that recovers by itself
    Warning = 1,
    /// An operation failed
    Error = 2,
    /// A site cannot run
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}
