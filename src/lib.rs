//! Spaced-repetition cloze review engine for note editors.
//!
//! Documents carry inline cloze spans (`{{...}}`); this crate
//! recognizes them, classifies each span's memorization state from its
//! review history and the clock, schedules the next review with an
//! SM-2 variant, and persists schedules against a primary structured
//! store with a key-value fallback.
//!
//! The host shell integrates through [`engine::start_review_engine`]:
//! commands in (render, reveal, grade), events out (span states,
//! prompt lifecycle). The pieces underneath ([`cloze`] parsing,
//! [`review`] classification and scheduling, [`sync`] persistence) are
//! plain library code usable without the engine loop.

pub mod cloze;
pub mod engine;
pub mod review;
pub mod sync;

pub use cloze::{ClozeParser, ClozeSpan};
pub use engine::{start_review_engine, ReviewCommand, ReviewEngine, ReviewEvent, SpanView};
pub use review::{
    classify, next_schedule, ContextId, Grade, InvalidGrade, ReviewConfig, ReviewSchedule,
    SpanState, Visibility,
};
pub use sync::{Backends, FileKeyValueStore, FileReviewStore, ReviewSync};
