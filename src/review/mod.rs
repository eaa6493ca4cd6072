//! Spaced-repetition core
//!
//! This module provides:
//! - Review data models (schedules, grades, span states, config)
//! - The SM-2 variant scheduler with fractional-day intervals
//! - The pure span-state classifier

pub mod algorithm;
pub mod classifier;
pub mod models;

pub use algorithm::{format_interval, next_schedule, preview_intervals};
pub use classifier::classify;
pub use models::*;
