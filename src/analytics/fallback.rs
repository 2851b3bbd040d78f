use chrono::NaiveDate;

use super::service_levels::ServiceLevel;

/// Picks the week that best represents typical service inside a window.
///
/// A missing bound is open; an inverted window (`end < start`) is treated as
/// fully open. Among ranges intersecting the window the one with the most weekly
/// service wins, ties going to the earliest start. Returns that range's first
/// Monday, or `None` if nothing intersects.
pub fn fallback_week(
    window_start: Option<NaiveDate>,
    window_end: Option<NaiveDate>,
    levels: &[ServiceLevel],
) -> Option<NaiveDate> {
    let (start, end) = match (window_start, window_end) {
        (Some(s), Some(e)) if e < s => (None, None),
        bounds => bounds,
    };

    levels
        .iter()
        .filter(|l| start.is_none_or(|s| l.end_date >= s))
        .filter(|l| end.is_none_or(|e| l.start_date <= e))
        .min_by(|a, b| b.total().cmp(&a.total()).then(a.start_date.cmp(&b.start_date)))
        .map(|l| l.start_date)
}
