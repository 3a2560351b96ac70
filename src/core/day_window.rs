//! The engine's "local day": a 24 hour window that closes at 19:00 UTC.
//!
//! A diary written at any instant belongs to the window `[previous day 19:00 UTC,
//! day 19:00 UTC)`. The window is keyed by the calendar date on which it closes.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

/// Hour (UTC) at which one local day ends and the next begins
pub const DAY_BOUNDARY_HOUR_UTC: i64 = 19;

/// One local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Calendar date on which the window closes; used as the uniqueness key
    pub day: NaiveDate,
    /// First instant inside the window
    pub start: DateTime<Utc>,
    /// First instant after the window
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Returns the window that contains `instant`.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let shift = TimeDelta::hours(24 - DAY_BOUNDARY_HOUR_UTC);
        let day = (instant + shift).date_naive();
        let start = day.and_time(NaiveTime::MIN).and_utc() - shift;
        Self {
            day,
            start,
            end: start + TimeDelta::days(1),
        }
    }

    /// Whether `instant` falls inside this window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single().unwrap()
    }

    #[test]
    fn test_morning_belongs_to_window_closing_today() {
        let window = DayWindow::containing(at(2024, 1, 2, 10, 0, 0));
        assert_eq!(window.day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(window.start, at(2024, 1, 1, 19, 0, 0));
        assert_eq!(window.end, at(2024, 1, 2, 19, 0, 0));
    }

    #[test]
    fn test_boundary_edges() {
        let last_second = DayWindow::containing(at(2024, 1, 2, 18, 59, 59));
        assert_eq!(last_second.day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let boundary = DayWindow::containing(at(2024, 1, 2, 19, 0, 0));
        assert_eq!(boundary.day, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(boundary.start, at(2024, 1, 2, 19, 0, 0));
    }

    #[test]
    fn test_evening_rolls_into_next_day() {
        let window = DayWindow::containing(at(2023, 12, 31, 22, 30, 0));
        assert_eq!(window.day, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(window.contains(at(2023, 12, 31, 22, 30, 0)));
        assert!(window.contains(at(2024, 1, 1, 18, 59, 59)));
        assert!(!window.contains(at(2024, 1, 1, 19, 0, 0)));
        assert!(!window.contains(at(2023, 12, 31, 18, 59, 59)));
    }
}
