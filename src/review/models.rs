//! Data models for the review engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor assigned to a span that has never been reviewed
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Milliseconds per day; all day→timestamp conversions go through this
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// One minute expressed in days, the unit of sub-day learning steps
pub const MINUTE_DAYS: f64 = 1.0 / 1440.0;

/// Recall grade submitted from the grading prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Grade {
    /// Failed recall; resets to the shortest learning step
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled correctly
    Good = 3,
    /// Recalled effortlessly
    Easy = 4,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid grade {0}, expected 1..=4")]
pub struct InvalidGrade(pub i32);

impl TryFrom<i32> for Grade {
    type Error = InvalidGrade;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Grade::Again),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            other => Err(InvalidGrade(other)),
        }
    }
}

impl From<Grade> for i32 {
    fn from(grade: Grade) -> i32 {
        grade as i32
    }
}

/// Review schedule for one cloze span, keyed by its locator.
///
/// Created implicitly on the first grade; mutated only by the scheduler.
/// Invariant: `review_count == 0` ⇔ `due_at == None` ⇔ `last_grade == None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSchedule {
    /// When the span should next be surfaced for recall
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_grade: Option<Grade>,
    /// Total reviews so far; 0 means "new"
    #[serde(default)]
    pub review_count: i32,
    /// Current interval in days; sub-day fractions are minute steps
    #[serde(default)]
    pub interval: f64,
    /// SM-2 ease factor (floor 1.3)
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
}

fn default_ease_factor() -> f64 {
    DEFAULT_EASE_FACTOR
}

impl Default for ReviewSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSchedule {
    /// A fresh schedule for a span that has never been graded
    pub fn new() -> Self {
        Self {
            due_at: None,
            last_reviewed_at: None,
            last_grade: None,
            review_count: 0,
            interval: 0.0,
            ease_factor: DEFAULT_EASE_FACTOR,
        }
    }
}

/// Display/interaction state of a cloze span, derived from its schedule
/// and the wall clock by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpanState {
    /// Never reviewed
    New,
    /// Just failed; re-grading suppressed for the cooldown window
    Cooling,
    /// Comfortably ahead of its due date
    Cleared,
    /// In sub-day learning steps, not yet graduated
    Learning,
    /// Overdue past the danger threshold
    Danger,
    /// Due for review
    Due,
}

/// Default visual state of a span before any user interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl SpanState {
    /// Cleared and cooling spans render with their text shown; everything
    /// else stays occluded pending user interaction
    pub fn default_visibility(self) -> Visibility {
        match self {
            SpanState::Cleared | SpanState::Cooling => Visibility::Visible,
            _ => Visibility::Hidden,
        }
    }

    /// Whether revealing the span should open a grading prompt.
    /// Cooling spans reveal silently so the user cannot re-grade the
    /// same span within one sitting.
    pub fn allows_grading(self) -> bool {
        !matches!(self, SpanState::Cooling)
    }
}

/// Identifies the document whose spans are currently tracked.
/// The review store cache is scoped to exactly one context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tunables for classification and the grading prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewConfig {
    /// Cooldown after a failed recall during which re-grading is
    /// suppressed, in milliseconds
    pub cooling_period_ms: i64,
    /// Safety margin before the due date within which a span is treated
    /// as effectively due, in hours
    pub hide_before_due_hours: i64,
    /// Days overdue beyond which a span is flagged as danger
    pub danger_threshold_days: i64,
    /// Auto-dismiss timeout for the grading prompt; None disables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_timeout_ms: Option<u64>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            cooling_period_ms: 60_000,
            hide_before_due_hours: 12,
            danger_threshold_days: 7,
            prompt_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_try_from_accepts_valid_range() {
        assert_eq!(Grade::try_from(1), Ok(Grade::Again));
        assert_eq!(Grade::try_from(2), Ok(Grade::Hard));
        assert_eq!(Grade::try_from(3), Ok(Grade::Good));
        assert_eq!(Grade::try_from(4), Ok(Grade::Easy));
    }

    #[test]
    fn grade_try_from_rejects_out_of_range() {
        assert_eq!(Grade::try_from(0), Err(InvalidGrade(0)));
        assert_eq!(Grade::try_from(5), Err(InvalidGrade(5)));
        assert_eq!(Grade::try_from(-1), Err(InvalidGrade(-1)));
    }

    #[test]
    fn grade_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Grade::Good).unwrap(), "3");
        let grade: Grade = serde_json::from_str("1").unwrap();
        assert_eq!(grade, Grade::Again);
        assert!(serde_json::from_str::<Grade>("7").is_err());
    }

    #[test]
    fn new_schedule_upholds_invariant() {
        let s = ReviewSchedule::new();
        assert_eq!(s.review_count, 0);
        assert!(s.due_at.is_none());
        assert!(s.last_grade.is_none());
        assert_eq!(s.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(s.interval, 0.0);
    }

    #[test]
    fn schedule_deserializes_with_defaults() {
        let s: ReviewSchedule = serde_json::from_str("{}").unwrap();
        assert_eq!(s, ReviewSchedule::new());
    }

    #[test]
    fn visibility_policy_matches_state() {
        assert_eq!(SpanState::Cleared.default_visibility(), Visibility::Visible);
        assert_eq!(SpanState::Cooling.default_visibility(), Visibility::Visible);
        for state in [
            SpanState::New,
            SpanState::Learning,
            SpanState::Due,
            SpanState::Danger,
        ] {
            assert_eq!(state.default_visibility(), Visibility::Hidden);
        }
    }

    #[test]
    fn only_cooling_blocks_grading() {
        assert!(!SpanState::Cooling.allows_grading());
        assert!(SpanState::Due.allows_grading());
        assert!(SpanState::Cleared.allows_grading());
    }
}
