//! Lumen Engine - site render loops and controller streaming
//!
//! Each site renders effects into a canvas on its own thread at a fixed rate
//! and streams windows of that canvas to TCP pixel controllers. Every
//! controller has its own bounded outbound queue and worker thread; sockets
//! are pooled per host.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod canvas;
pub mod controller;
pub mod effect;
pub mod location;
pub mod metrics;
pub mod prelude;
pub mod registry;
pub mod schedule;

pub use canvas::{Canvas, CanvasInfo, CanvasRegistry, PixelCanvas};
pub use controller::{
    ControllerChannel, ControllerSocket, ControllerStatus, EnqueueOutcome, OUTBOUND_QUEUE_CAP,
    SocketPool,
};
pub use effect::{Effect, EffectOrigin, EffectRegistry, EffectState};
pub use location::{EFFECT_QUEUE_CAP, EffectSummary, Location, LocationStatus, RenderReport};
pub use registry::{EffectRequest, LocationRegistry};
pub use schedule::{LocalTime, ManualClock, SystemClock, WallClock};
