//! Busy-period tracking with sorted, non-overlapping windows.

use chrono::{DateTime, Utc};

use crate::models::DateWindow;

/// Sorted, non-overlapping busy windows of one assignee.
///
/// Windows are half-open (`start..end`), so touching windows stay separate.
#[derive(Clone, Debug, Default)]
pub struct BusyCalendar {
    periods: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BusyCalendar {
    /// Build a calendar from arbitrary windows: empty or inverted windows are
    /// dropped, the rest sorted by start and swept into merged ranges.
    pub fn from_windows(mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)>) -> Self {
        windows.retain(|(start, end)| start < end);
        windows.sort_by_key(|(start, _)| *start);

        let mut periods: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(windows.len());
        for (start, end) in windows {
            match periods.last_mut() {
                Some(last) if start < last.1 => last.1 = last.1.max(end),
                _ => periods.push((start, end)),
            }
        }
        Self { periods }
    }

    pub fn windows(&self) -> Vec<DateWindow> {
        self.periods
            .iter()
            .map(|&(start, end)| DateWindow { start, end })
            .collect()
    }
}

/// Whether two half-open windows intersect.
pub fn windows_overlap(
    a: (DateTime<Utc>, DateTime<Utc>),
    b: (DateTime<Utc>, DateTime<Utc>),
) -> bool {
    a.0 < b.1 && b.0 < a.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap()
    }

    fn spans(calendar: &BusyCalendar) -> Vec<(u32, u32)> {
        use chrono::Datelike;
        calendar
            .windows()
            .iter()
            .map(|w| (w.start.day(), w.end.day()))
            .collect()
    }

    #[test]
    fn test_from_windows_merges_overlaps() {
        let calendar = BusyCalendar::from_windows(vec![
            (day(10), day(12)),
            (day(1), day(5)),
            (day(4), day(8)),
            (day(12), day(14)),
        ]);
        assert_eq!(spans(&calendar), vec![(1, 8), (10, 12), (12, 14)]);
    }

    #[test]
    fn test_nested_and_chained_windows_collapse() {
        let calendar = BusyCalendar::from_windows(vec![
            (day(3), day(9)),
            (day(1), day(2)),
            (day(8), day(15)),
            (day(20), day(21)),
            (day(5), day(6)),
        ]);
        assert_eq!(spans(&calendar), vec![(1, 2), (3, 15), (20, 21)]);
    }

    #[test]
    fn test_inverted_and_empty_windows_ignored() {
        let calendar = BusyCalendar::from_windows(vec![(day(5), day(2)), (day(5), day(5))]);
        assert!(calendar.windows().is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        assert!(windows_overlap((day(1), day(5)), (day(4), day(8))));
        assert!(!windows_overlap((day(1), day(5)), (day(5), day(8))));
    }
}
