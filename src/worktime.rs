//! Work start/end/duration for an assigned column, and weekly totals.
use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::date_index::DateIndex;
use crate::timegrid::{format_duration_hm, format_hm, TimeGrid};

pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub minutes: i64,
}

impl WorkSpan {
    /// From the first assigned slot to the end of the last one. `None` when
    /// no slot is assigned.
    pub fn from_slots(grid: &TimeGrid, assigned: &[bool]) -> Option<Self> {
        let first = assigned.iter().position(|a| *a)?;
        let last = assigned.iter().rposition(|a| *a)?;
        let start = grid.slot_time(first)?;
        let last_start = grid.slot_time(last)?;
        let end = last_start + Duration::minutes(i64::from(grid.step_minutes()));
        let minutes = ((last - first + 1) as i64) * i64::from(grid.step_minutes());
        Some(Self {
            start,
            end,
            minutes,
        })
    }

    pub fn start_label(&self) -> String {
        format_hm(self.start)
    }

    pub fn end_label(&self) -> String {
        format_hm(self.end)
    }

    pub fn duration_label(&self) -> String {
        format_duration_hm(self.minutes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekTotal {
    pub days: usize,
    pub minutes: i64,
}

impl WeekTotal {
    pub fn duration_label(&self) -> String {
        format_duration_hm(self.minutes)
    }
}

/// Weekly totals for one member. Dates are blocked by order: week `k` holds
/// orders `7k..7k+6`. `span_for` returns the member's span on a date, if any.
pub fn weekly_totals<F>(dates: &DateIndex, mut span_for: F) -> Vec<WeekTotal>
where
    F: FnMut(chrono::NaiveDate) -> Option<WorkSpan>,
{
    let weeks = dates.len().div_ceil(DAYS_PER_WEEK);
    let mut totals = vec![WeekTotal::default(); weeks];
    for (order, date) in dates.iter().enumerate() {
        if let Some(span) = span_for(date) {
            let week = &mut totals[order / DAYS_PER_WEEK];
            week.days += 1;
            week.minutes += span.minutes;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn grid() -> TimeGrid {
        TimeGrid::new(hm(8, 0), hm(22, 0), 30).unwrap()
    }

    #[test]
    fn span_covers_first_to_last_assigned_slot() {
        let mut assigned = vec![false; 28];
        assigned[2] = true; // 9:00
        assigned[3] = true;
        assigned[7] = true; // 11:30
        let span = WorkSpan::from_slots(&grid(), &assigned).unwrap();
        assert_eq!(span.start_label(), "9:00");
        assert_eq!(span.end_label(), "12:00");
        assert_eq!(span.minutes, 180);
        assert_eq!(span.duration_label(), "3:00");
    }

    #[test]
    fn nothing_assigned_is_no_span() {
        assert_eq!(WorkSpan::from_slots(&grid(), &[false; 28]), None);
        assert_eq!(WorkSpan::from_slots(&grid(), &[]), None);
    }

    #[test]
    fn weekly_totals_block_by_order() {
        let start = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let dates = DateIndex::build((0..9).map(|i| start + Duration::days(i)));
        let span = WorkSpan {
            start: hm(9, 0),
            end: hm(11, 30),
            minutes: 150,
        };
        // work on orders 0, 6, 7
        let worked = [0usize, 6, 7];
        let totals = weekly_totals(&dates, |d| {
            let order = dates.order_of(d).unwrap();
            worked.contains(&order).then_some(span)
        });
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0], WeekTotal { days: 2, minutes: 300 });
        assert_eq!(totals[1], WeekTotal { days: 1, minutes: 150 });
        assert_eq!(totals[0].duration_label(), "5:00");
    }
}
