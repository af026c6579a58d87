//! Fixed-rate frame pacing for Lumen site render loops.
//!
//! - **FramePacer**: accumulating tick boundaries (`next = previous + period`)
//!   with a minimal yield when a tick overruns
//! - **HeadroomMetrics**: rendered/dropped tick counts and a rolling
//!   one-second minimum of spare time per tick
//!
//! # Example
//!
//! ```no_run
//! use lumen_scheduler::FramePacer;
//!
//! let mut pacer = FramePacer::new(21).expect("fps must be non-zero");
//! loop {
//!     let tick = pacer.begin_tick();
//!     // render the frame due at tick.wall_clock
//!     let _ = pacer.finish_tick();
//! #   break;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod error;
pub mod headroom;
pub mod pacer;

pub use error::{PacerError, PacerResult};
pub use headroom::HeadroomMetrics;
pub use pacer::{FramePacer, Tick, TickOutcome};

use std::time::Duration;

/// Sleep taken after a dropped tick so the loop still yields the CPU.
pub const DROPPED_TICK_YIELD: Duration = Duration::from_millis(1);

/// Length of the spare-time rolling window.
pub const HEADROOM_WINDOW: Duration = Duration::from_secs(1);
