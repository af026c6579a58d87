//! Site configuration for the Lumen server.
//!
//! One JSON file per site (a "location"), camelCase keys, every field but
//! `name` and the controller `host` optional. [`load_locations`] reads a
//! directory of them and runs [`validate_locations`] before returning.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_location_file, load_locations, save_location};
pub use model::{
    ALL_DAYS, ControllerConfig, DEFAULT_BATCH_SIZE, DEFAULT_CANVAS_TYPE, DEFAULT_FPS,
    DEFAULT_FRAMES_PER_BUFFER, DEFAULT_HEIGHT, DEFAULT_WIDTH, LocationConfig,
    ScheduledEffectConfig, new_effect_id,
};
pub use validation::{ScheduleOverlap, find_schedule_overlaps, validate_location, validate_locations};
