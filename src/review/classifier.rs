//! Span state classification
//!
//! Maps a span's review history and the wall clock to one of six
//! display/interaction states. Pure and synchronous; reads whatever
//! schedule the caller hands it and never touches storage.

use chrono::{DateTime, Utc};

use super::models::{ReviewConfig, ReviewSchedule, SpanState, MS_PER_DAY};

/// Classify a span from its schedule (absent = never graded) at `now`.
///
/// Evaluation order matters; the first matching state wins:
/// 1. New: no schedule, or never reviewed.
/// 2. Cooling: interval short enough to be a relearning step, not yet
///    due, and reviewed within the cooldown window. Keeps a just-failed
///    span out of an immediate re-grading loop.
/// 3. Cleared: due date still beyond the hide-before-due safety
///    margin. Stricter than "not yet due": a span within the margin is
///    treated as effectively due so it does not look mastered right
///    before it needs review.
/// 4. Learning: sub-day interval, not yet graduated.
/// 5. Danger: overdue past the danger threshold.
/// 6. Due: everything else.
pub fn classify(
    schedule: Option<&ReviewSchedule>,
    now: DateTime<Utc>,
    config: &ReviewConfig,
) -> SpanState {
    let Some(schedule) = schedule else {
        return SpanState::New;
    };
    if schedule.review_count == 0 {
        return SpanState::New;
    }

    // A reviewed schedule carries both timestamps; a record that lost
    // them is treated as due rather than new.
    let (Some(due_at), Some(last_reviewed_at)) = (schedule.due_at, schedule.last_reviewed_at)
    else {
        return SpanState::Due;
    };

    let interval_ms = schedule.interval * MS_PER_DAY;
    let since_review_ms = (now - last_reviewed_at).num_milliseconds();
    if interval_ms < (config.cooling_period_ms * 2) as f64
        && due_at > now
        && since_review_ms < config.cooling_period_ms
    {
        return SpanState::Cooling;
    }

    let until_due_ms = (due_at - now).num_milliseconds();
    if until_due_ms > config.hide_before_due_hours * 3_600_000 {
        return SpanState::Cleared;
    }

    if schedule.interval < 1.0 {
        return SpanState::Learning;
    }

    if -until_due_ms >= config.danger_threshold_days * MS_PER_DAY as i64 {
        return SpanState::Danger;
    }

    SpanState::Due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::algorithm::next_schedule;
    use crate::review::models::Grade;
    use chrono::Duration;

    fn schedule(
        interval: f64,
        due_in_ms: i64,
        reviewed_ago_ms: i64,
        now: DateTime<Utc>,
    ) -> ReviewSchedule {
        ReviewSchedule {
            due_at: Some(now + Duration::milliseconds(due_in_ms)),
            last_reviewed_at: Some(now - Duration::milliseconds(reviewed_ago_ms)),
            last_grade: Some(Grade::Good),
            review_count: 1,
            interval,
            ease_factor: 2.5,
        }
    }

    #[test]
    fn absent_schedule_is_new() {
        let config = ReviewConfig::default();
        assert_eq!(classify(None, Utc::now(), &config), SpanState::New);
    }

    #[test]
    fn unreviewed_schedule_is_new() {
        let config = ReviewConfig::default();
        let s = ReviewSchedule::new();
        assert_eq!(classify(Some(&s), Utc::now(), &config), SpanState::New);
    }

    #[test]
    fn reviewed_schedule_is_never_new() {
        let config = ReviewConfig::default();
        let now = Utc::now();
        // Sweep a spread of intervals and offsets; none may classify New
        for interval in [1.0 / 1440.0, 10.0 / 1440.0, 0.5, 1.0, 5.0, 30.0] {
            for due_in_ms in [-10 * 86_400_000, -1000, 0, 1000, 10 * 86_400_000] {
                let s = schedule(interval, due_in_ms, 30_000, now);
                assert_ne!(classify(Some(&s), now, &config), SpanState::New);
            }
        }
    }

    #[test]
    fn reviewed_schedule_missing_due_date_is_due() {
        let config = ReviewConfig::default();
        let s = ReviewSchedule {
            review_count: 3,
            ..ReviewSchedule::new()
        };
        assert_eq!(classify(Some(&s), Utc::now(), &config), SpanState::Due);
    }

    #[test]
    fn failed_span_cools_then_relearns() {
        // Scenario: interval=5, ease=2.5, graded Again
        let config = ReviewConfig::default();
        let now = Utc::now();
        let prev = schedule(5.0, 0, 86_400_000, now);
        let failed = next_schedule(Some(&prev), Grade::Again, now);

        assert_eq!(failed.interval, 1.0 / 1440.0);
        assert!((failed.ease_factor - 2.3).abs() < 1e-9);

        // 30s after the failed grade: inside the cooldown, not yet due
        let at_30s = now + Duration::seconds(30);
        assert_eq!(classify(Some(&failed), at_30s, &config), SpanState::Cooling);

        // Past the cooldown the span is a learning step again
        let past_cooldown = now + Duration::milliseconds(config.cooling_period_ms + 1000);
        assert_eq!(
            classify(Some(&failed), past_cooldown, &config),
            SpanState::Learning
        );
    }

    #[test]
    fn cooling_expires_before_due_date() {
        // With a 45s cooldown and a one-minute interval, the window
        // between cooldown expiry and the due date classifies Learning
        let config = ReviewConfig {
            cooling_period_ms: 45_000,
            ..ReviewConfig::default()
        };
        let now = Utc::now();
        let failed = next_schedule(None, Grade::Again, now);

        let inside = now + Duration::seconds(30);
        assert_eq!(classify(Some(&failed), inside, &config), SpanState::Cooling);

        // 46s: cooldown over, due date (60s) still ahead
        let expired = now + Duration::seconds(46);
        assert_eq!(
            classify(Some(&failed), expired, &config),
            SpanState::Learning
        );
    }

    #[test]
    fn cleared_requires_margin_beyond_due() {
        let config = ReviewConfig::default();
        let now = Utc::now();

        // Due in 3 days: well past the 12h margin
        let s = schedule(5.0, 3 * 86_400_000, 2 * 86_400_000, now);
        assert_eq!(classify(Some(&s), now, &config), SpanState::Cleared);

        // Due in 6 hours: inside the margin, effectively due
        let s = schedule(5.0, 6 * 3_600_000, 5 * 86_400_000, now);
        assert_eq!(classify(Some(&s), now, &config), SpanState::Due);
    }

    #[test]
    fn sub_day_interval_is_learning_once_due() {
        let config = ReviewConfig::default();
        let now = Utc::now();
        let s = schedule(10.0 / 1440.0, -1000, 700_000, now);
        assert_eq!(classify(Some(&s), now, &config), SpanState::Learning);
    }

    #[test]
    fn overdue_past_threshold_is_danger() {
        let config = ReviewConfig::default();
        let now = Utc::now();

        let s = schedule(5.0, -8 * 86_400_000, 13 * 86_400_000, now);
        assert_eq!(classify(Some(&s), now, &config), SpanState::Danger);

        // Six days overdue is still plain Due
        let s = schedule(5.0, -6 * 86_400_000, 11 * 86_400_000, now);
        assert_eq!(classify(Some(&s), now, &config), SpanState::Due);
    }

    /// Table-driven sweep of the cooling/cleared interaction near the
    /// one-day interval boundary, where the two predicates are closest.
    #[test]
    fn cooling_cleared_boundary() {
        let config = ReviewConfig::default();
        let now = Utc::now();
        let cooling_ms = config.cooling_period_ms; // 60_000

        // (interval days, due_in_ms, reviewed_ago_ms, expected)
        let cases = [
            // Interval exactly 2x cooldown: guard is strict `<`, so no
            // cooling even right after review
            (
                2.0 * 60_000.0 / MS_PER_DAY,
                90_000,
                1_000,
                SpanState::Learning,
            ),
            // Just under 2x cooldown, reviewed moments ago, due soon
            (
                119_000.0 / MS_PER_DAY,
                100_000,
                1_000,
                SpanState::Cooling,
            ),
            // Same interval but the cooldown has lapsed
            (
                119_000.0 / MS_PER_DAY,
                50_000,
                cooling_ms + 1,
                SpanState::Learning,
            ),
            // Day-scale interval can never cool: falls through to the
            // margin test, and a due date 1 day out is inside 12h+1d? No:
            // 1 day > 12h margin, so Cleared
            (1.0, 86_400_000, 1_000, SpanState::Cleared),
            // Day-scale, due within the margin: Due even seconds after
            // review
            (1.0, 3_600_000, 1_000, SpanState::Due),
            // Sub-day interval due within the margin but cooldown lapsed:
            // Learning beats Due
            (0.5, 3_600_000, cooling_ms + 1, SpanState::Learning),
            // Overdue sub-day interval: Learning beats Danger
            (0.5, -10 * 86_400_000, 10 * 86_400_000, SpanState::Learning),
        ];

        for (interval, due_in_ms, reviewed_ago_ms, expected) in cases {
            let s = schedule(interval, due_in_ms, reviewed_ago_ms, now);
            assert_eq!(
                classify(Some(&s), now, &config),
                expected,
                "interval={} due_in_ms={} reviewed_ago_ms={}",
                interval,
                due_in_ms,
                reviewed_ago_ms
            );
        }
    }
}
