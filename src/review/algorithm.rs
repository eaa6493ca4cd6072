//! SM-2 variant scheduler
//!
//! Computes the next review schedule from a recall grade. Unlike classic
//! SM-2 this variant keeps fractional-day intervals, so freshly failed or
//! newly learned spans cycle on minute-scale steps before graduating to
//! day-scale review.
//!
//! Grades (1-4):
//! - 1: Again: failed recall, reset to the shortest step
//! - 2: Hard: recalled with serious difficulty
//! - 3: Good: recalled correctly
//! - 4: Easy: recalled effortlessly

use chrono::{DateTime, Duration, Utc};

use super::models::{
    Grade, ReviewSchedule, DEFAULT_EASE_FACTOR, MINUTE_DAYS, MIN_EASE_FACTOR, MS_PER_DAY,
};

/// Interval after a failed recall: one minute
const AGAIN_STEP_DAYS: f64 = MINUTE_DAYS;

/// Interval for Hard while still in learning: five minutes
const HARD_STEP_DAYS: f64 = 5.0 * MINUTE_DAYS;

/// Interval for Good while still in learning: ten minutes
const GOOD_STEP_DAYS: f64 = 10.0 * MINUTE_DAYS;

/// A Good answer graduates to day-scale review only once the prior
/// learning step has reached this length (nine minutes)
const GRADUATION_GATE_DAYS: f64 = 9.0 * MINUTE_DAYS;

/// First day-scale interval after graduating with Good
const GRADUATING_INTERVAL_DAYS: f64 = 1.0;

/// Easy skips the remaining learning steps and graduates straight to
/// four days
const EASY_GRADUATING_INTERVAL_DAYS: f64 = 4.0;

/// Extra multiplier applied to Easy answers in day-scale review
const EASY_BONUS: f64 = 1.3;

/// Compute the next schedule for a span given its previous schedule and
/// the submitted grade.
///
/// Pure and total: `previous = None` is treated as a fresh schedule
/// (ease 2.5, interval 0), and identical inputs always produce identical
/// output. The grade has already been validated at the engine boundary.
pub fn next_schedule(
    previous: Option<&ReviewSchedule>,
    grade: Grade,
    now: DateTime<Utc>,
) -> ReviewSchedule {
    let (mut ease, prior_interval, review_count) = match previous {
        Some(s) => (s.ease_factor, s.interval, s.review_count),
        None => (DEFAULT_EASE_FACTOR, 0.0, 0),
    };

    let learning = prior_interval < 1.0;
    let interval = match grade {
        // Always reset to the shortest step, regardless of how far the
        // span had progressed. The short interval plus fresh
        // last_reviewed_at is what the classifier reads as "cooling".
        Grade::Again => {
            ease = (ease - 0.2).max(MIN_EASE_FACTOR);
            AGAIN_STEP_DAYS
        }

        // Sub-day learning steps
        Grade::Hard if learning => HARD_STEP_DAYS,
        Grade::Good if learning => {
            if prior_interval >= GRADUATION_GATE_DAYS {
                GRADUATING_INTERVAL_DAYS
            } else {
                GOOD_STEP_DAYS
            }
        }
        Grade::Easy if learning => EASY_GRADUATING_INTERVAL_DAYS,

        // Graduated, day-scale review
        Grade::Hard => {
            ease = (ease - 0.15).max(MIN_EASE_FACTOR);
            prior_interval * 1.2
        }
        Grade::Good => prior_interval * ease,
        Grade::Easy => {
            ease += 0.15;
            prior_interval * ease * EASY_BONUS
        }
    };

    ReviewSchedule {
        due_at: Some(now + interval_duration(interval)),
        last_reviewed_at: Some(now),
        last_grade: Some(grade),
        review_count: review_count + 1,
        interval,
        ease_factor: ease,
    }
}

/// Convert a fractional-day interval to a chrono duration, truncating
/// only at the millisecond boundary
fn interval_duration(interval_days: f64) -> Duration {
    Duration::milliseconds((interval_days * MS_PER_DAY).round() as i64)
}

/// Intervals each grade would produce, in days, for display in the
/// grading prompt: [Again, Hard, Good, Easy]
pub fn preview_intervals(previous: Option<&ReviewSchedule>, now: DateTime<Utc>) -> [f64; 4] {
    [
        next_schedule(previous, Grade::Again, now).interval,
        next_schedule(previous, Grade::Hard, now).interval,
        next_schedule(previous, Grade::Good, now).interval,
        next_schedule(previous, Grade::Easy, now).interval,
    ]
}

/// Format a fractional-day interval as a short human-readable string
pub fn format_interval(days: f64) -> String {
    if days <= 0.0 {
        "now".to_string()
    } else if days < 1.0 {
        let minutes = (days * 1440.0).round() as i64;
        if minutes < 1 {
            "now".to_string()
        } else if minutes < 60 {
            format!("{}m", minutes)
        } else {
            format!("{}h", minutes / 60)
        }
    } else {
        let whole = days.round() as i64;
        if whole < 7 {
            format!("{}d", whole)
        } else if whole < 30 {
            format!("{}w", whole / 7)
        } else if whole < 365 {
            format!("{}mo", whole / 30)
        } else {
            format!("{}y", whole / 365)
        }
    }
}
