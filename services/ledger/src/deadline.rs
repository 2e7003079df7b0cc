//! Deadline estimation from the coarse remaining-time category
//!
//! | category   | remaining time |
//! |------------|----------------|
//! | SHORT      | [0, 30m)       |
//! | MEDIUM     | [30m, 2h)      |
//! | LONG       | [2h, 12h)      |
//! | VERY_LONG  | [12h, 48h)     |
//!
//! The estimate is a heuristic. Closure classification compares it against
//! the snapshot time as-is, so listings closing near a bucket boundary can
//! be misclassified; that approximation is accepted.

use auction_types::listing::TimeLeft;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("Unknown remaining-time category: {0:?}")]
    UnknownCategory(String),
}

/// Remaining-time interval `[min, max)` for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub min: Duration,
    pub max: Duration,
}

/// Look up the interval for a category.
///
/// Any category outside the fixed set is an upstream schema change and
/// fails with `UnknownCategory`.
pub fn expiry_window(category: &TimeLeft) -> Result<ExpiryWindow, EstimateError> {
    let (min, max) = match category {
        TimeLeft::Short => (Duration::zero(), Duration::minutes(30)),
        TimeLeft::Medium => (Duration::minutes(30), Duration::hours(2)),
        TimeLeft::Long => (Duration::hours(2), Duration::hours(12)),
        TimeLeft::VeryLong => (Duration::hours(12), Duration::hours(48)),
        TimeLeft::Unrecognized(raw) => return Err(EstimateError::UnknownCategory(raw.clone())),
    };
    Ok(ExpiryWindow { min, max })
}

/// Deadline for a listing first seen at `observed_at`.
///
/// With no watermark (first snapshot ever for the realm) the near bound
/// `observed_at + min` is used. Otherwise the listing may have been posted
/// any time since the previous capture, so the far bound from the
/// watermark is taken unless it falls before `observed_at + min`.
pub fn initial_deadline(
    category: &TimeLeft,
    observed_at: DateTime<Utc>,
    watermark: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>, EstimateError> {
    let window = expiry_window(category)?;
    let near = observed_at + window.min;
    let Some(previous) = watermark else {
        return Ok(near);
    };
    let far = previous + window.max;
    Ok(if far < near { near } else { far })
}

/// Deadline after the category changed at `observed_at`: always the far
/// bound of the new category.
pub fn refreshed_deadline(
    category: &TimeLeft,
    observed_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, EstimateError> {
    Ok(observed_at + expiry_window(category)?.max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_table() {
        let short = expiry_window(&TimeLeft::Short).unwrap();
        assert_eq!(short.min, Duration::zero());
        assert_eq!(short.max, Duration::minutes(30));

        let very_long = expiry_window(&TimeLeft::VeryLong).unwrap();
        assert_eq!(very_long.min, Duration::hours(12));
        assert_eq!(very_long.max, Duration::hours(48));
    }

    #[test]
    fn test_windows_are_contiguous() {
        let windows: Vec<ExpiryWindow> = TimeLeft::KNOWN
            .iter()
            .map(|c| expiry_window(c).unwrap())
            .collect();
        for pair in windows.windows(2) {
            assert_eq!(pair[0].max, pair[1].min);
        }
    }

    #[test]
    fn test_unknown_category_fails() {
        let err = expiry_window(&TimeLeft::from("EPIC")).unwrap_err();
        assert_eq!(err, EstimateError::UnknownCategory("EPIC".to_string()));
    }

    #[test]
    fn test_initial_without_watermark_uses_near_bound() {
        let deadline = initial_deadline(&TimeLeft::Medium, t0(), None).unwrap();
        assert_eq!(deadline, t0() + Duration::minutes(30));
    }

    #[test]
    fn test_initial_with_recent_watermark_uses_far_bound() {
        let watermark = t0() - Duration::minutes(10);
        let deadline = initial_deadline(&TimeLeft::Short, t0(), Some(watermark)).unwrap();
        assert_eq!(deadline, watermark + Duration::minutes(30));
    }

    #[test]
    fn test_initial_with_stale_watermark_uses_near_bound() {
        let watermark = t0() - Duration::hours(5);
        let deadline = initial_deadline(&TimeLeft::Medium, t0(), Some(watermark)).unwrap();
        assert_eq!(deadline, t0() + Duration::minutes(30));
    }

    #[test]
    fn test_refresh_uses_far_bound_of_new_category() {
        let deadline = refreshed_deadline(&TimeLeft::Long, t0()).unwrap();
        assert_eq!(deadline, t0() + Duration::hours(12));
    }

    proptest! {
        #[test]
        fn prop_initial_never_before_near_bound(
            category in 0usize..4,
            gap_secs in 0i64..(72 * 3600),
        ) {
            let category = &TimeLeft::KNOWN[category];
            let watermark = t0() - Duration::seconds(gap_secs);
            let deadline = initial_deadline(category, t0(), Some(watermark)).unwrap();
            prop_assert!(deadline >= t0() + expiry_window(category).unwrap().min);
        }
    }
}
