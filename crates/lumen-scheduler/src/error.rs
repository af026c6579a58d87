//! Error types for the pacer crate.

use std::fmt;
use std::fmt::Display;

/// Pacer configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacerError {
    /// A frame rate of zero has no period
    ZeroFrameRate = 1,
    /// A zero-length period would spin
    ZeroPeriod = 2,
}

impl Display for PacerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacerError::ZeroFrameRate => write!(f, "Frame rate must be greater than zero"),
            PacerError::ZeroPeriod => write!(f, "Tick period must be greater than zero"),
        }
    }
}

impl std::error::Error for PacerError {}

/// Pacer result type
pub type PacerResult<T = ()> = Result<T, PacerError>;
