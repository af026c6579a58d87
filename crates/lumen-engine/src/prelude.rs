//! Common imports for embedding the engine.

pub use crate::canvas::{Canvas, CanvasInfo, CanvasRegistry};
pub use crate::effect::{Effect, EffectRegistry, EffectState, merge_typed};
pub use crate::location::{EffectSummary, Location, LocationStatus};
pub use crate::registry::{EffectRequest, LocationRegistry};
pub use crate::schedule::{LocalTime, SystemClock, WallClock};
pub use lumen_errors::{ControlError, EffectError, LumenError};
