//! Turning a member's raw (start, end) submission into a slot grid.
//!
//! Ambiguous input never suppresses availability: a blank, "no preference",
//! or unparseable bound resolves to the operating default for that side.
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::model::{Slot, Submission, WishStatus};
use crate::timegrid::{format_hm, parse_time_of_day, TimeGrid};

/// One side of a submitted window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    Unspecified,
    At(NaiveTime),
    /// Unparseable input, kept for logging and display.
    Invalid(String),
}

impl TimeBound {
    /// Text written next to the grid on the daily sheet.
    pub fn label(&self) -> String {
        match self {
            TimeBound::Unspecified => "full".to_string(),
            TimeBound::At(t) => format_hm(*t),
            TimeBound::Invalid(_) => "error".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub start: TimeBound,
    pub end: TimeBound,
    pub wish_status: WishStatus,
}

impl AvailabilityWindow {
    pub fn with_wish_status(mut self, wish_status: WishStatus) -> Self {
        self.wish_status = wish_status;
        self
    }

    /// Display labels for (start, end); blank when the member is unavailable.
    pub fn labels(&self) -> (String, String) {
        match self.wish_status {
            WishStatus::Unavailable => (String::new(), String::new()),
            WishStatus::Available => (self.start.label(), self.end.label()),
        }
    }
}

/// Normalizes raw submission cells. Holds the "no preference" sentinels.
#[derive(Debug, Clone)]
pub struct WindowParser {
    no_preference: Vec<String>,
}

impl WindowParser {
    pub fn new<I, S>(no_preference: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            no_preference: no_preference.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(&self, raw_start: Option<&str>, raw_end: Option<&str>) -> AvailabilityWindow {
        AvailabilityWindow {
            start: self.parse_bound(raw_start),
            end: self.parse_bound(raw_end),
            wish_status: WishStatus::Available,
        }
    }

    pub fn parse_submission(&self, submission: &Submission) -> AvailabilityWindow {
        self.parse(submission.raw_start.as_deref(), submission.raw_end.as_deref())
            .with_wish_status(submission.wish_status)
    }

    fn parse_bound(&self, raw: Option<&str>) -> TimeBound {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return TimeBound::Unspecified;
        };
        if self.no_preference.iter().any(|s| s == raw) {
            return TimeBound::Unspecified;
        }
        match parse_time_of_day(raw) {
            Ok(t) => TimeBound::At(t),
            Err(err) => {
                debug!(%err, "treating unparseable bound as unconstrained");
                TimeBound::Invalid(raw.to_string())
            }
        }
    }
}

impl Default for WindowParser {
    fn default() -> Self {
        Self::new(["指定なし", "unspecified"])
    }
}

/// Concrete (start, end); anything but a parsed time falls back to the defaults.
pub fn resolve_with_defaults(
    window: &AvailabilityWindow,
    default_open: NaiveTime,
    default_close: NaiveTime,
) -> (NaiveTime, NaiveTime) {
    let start = match window.start {
        TimeBound::At(t) => t,
        TimeBound::Unspecified | TimeBound::Invalid(_) => default_open,
    };
    let end = match window.end {
        TimeBound::At(t) => t,
        TimeBound::Unspecified | TimeBound::Invalid(_) => default_close,
    };
    (start, end)
}

/// Slot `i` is available iff `start <= t_i < end`, with all instants anchored
/// to `date`. An UNAVAILABLE wish blanks the whole grid first.
pub fn build_grid(
    window: &AvailabilityWindow,
    date: NaiveDate,
    default_open: NaiveTime,
    default_close: NaiveTime,
    grid: &TimeGrid,
) -> Vec<Slot> {
    if window.wish_status == WishStatus::Unavailable {
        return vec![Slot::Unavailable; grid.len()];
    }
    let (start, end) = resolve_with_defaults(window, default_open, default_close);
    let start = date.and_time(start);
    let end = date.and_time(end);
    grid.iter()
        .map(|t| {
            let t = date.and_time(t);
            if start <= t && t < end {
                Slot::Available
            } else {
                Slot::Unavailable
            }
        })
        .collect()
}

/// The grid builder handed to the orchestrator: fixed grid plus defaults.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    grid: TimeGrid,
    default_open: NaiveTime,
    default_close: NaiveTime,
}

impl GridBuilder {
    pub fn new(grid: TimeGrid, default_open: NaiveTime, default_close: NaiveTime) -> Self {
        Self {
            grid,
            default_open,
            default_close,
        }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn build(&self, window: &AvailabilityWindow, date: NaiveDate) -> Vec<Slot> {
        build_grid(window, date, self.default_open, self.default_close, &self.grid)
    }
}
