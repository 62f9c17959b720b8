//! Collection window bounds.

use chrono::{DateTime, Duration, Utc};

use crate::error::CollectError;

/// The inclusive `[start, end]` interval a collection run accepts posts
/// from, compared against each record's source timestamp.
///
/// A rolling window is resolved against "now" exactly once, at
/// construction — never per round — so the accepted interval cannot drift
/// while a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl CollectionWindow {
    /// Builds a window from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::InvalidWindow`] if `start` is after `end`.
    pub fn explicit(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CollectError> {
        if start > end {
            return Err(CollectError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Builds a rolling window ending at `now` and reaching back
    /// `within_minutes`.
    #[must_use]
    pub fn rolling(within_minutes: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::minutes(i64::from(within_minutes)),
            end: now,
        }
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `ts` falls inside the window (inclusive on both ends).
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    #[test]
    fn explicit_rejects_inverted_bounds() {
        let result =
            CollectionWindow::explicit(ts("2026-08-07T11:00:00Z"), ts("2026-08-07T10:00:00Z"));
        assert!(matches!(result, Err(CollectError::InvalidWindow { .. })));
    }

    #[test]
    fn explicit_accepts_equal_bounds() {
        let at = ts("2026-08-07T10:00:00Z");
        let window = CollectionWindow::explicit(at, at).unwrap();
        assert!(window.contains(at));
    }

    #[test]
    fn rolling_reaches_back_from_now() {
        let now = ts("2026-08-07T10:30:00Z");
        let window = CollectionWindow::rolling(30, now);
        assert_eq!(window.start(), ts("2026-08-07T10:00:00Z"));
        assert_eq!(window.end(), now);
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let window =
            CollectionWindow::explicit(ts("2026-08-07T10:00:00Z"), ts("2026-08-07T11:00:00Z"))
                .unwrap();
        assert!(window.contains(ts("2026-08-07T10:00:00Z")));
        assert!(window.contains(ts("2026-08-07T11:00:00Z")));
        assert!(!window.contains(ts("2026-08-07T09:59:59Z")));
        assert!(!window.contains(ts("2026-08-07T11:00:01Z")));
    }
}
