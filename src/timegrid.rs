//! Fixed-step slots covering the operating day, plus time-of-day helpers.
use chrono::{Duration, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TIME_OF_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid time-of-day pattern"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("not a time of day: {raw:?}")]
pub struct ParseError {
    pub raw: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("slot step must be > 0 minutes")]
    ZeroStep,
    #[error("operating window start {start} must be before end {end}")]
    EmptyWindow { start: String, end: String },
}

/// Parse `H:mm` / `HH:mm` (surrounding whitespace ignored).
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, ParseError> {
    let err = || ParseError {
        raw: raw.to_string(),
    };
    let caps = TIME_OF_DAY.captures(raw.trim()).ok_or_else(err)?;
    let h: u32 = caps[1].parse().map_err(|_| err())?;
    let m: u32 = caps[2].parse().map_err(|_| err())?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(err)
}

/// Format as `H:mm` without a leading zero on the hour (`8:00`, `21:30`).
pub fn format_hm(t: NaiveTime) -> String {
    format!("{}:{:02}", t.hour(), t.minute())
}

/// Minutes as `h:mm` (`90` -> `1:30`).
pub fn format_duration_hm(minutes: i64) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Immutable, uniformly spaced slot starts in `[window_start, window_end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    step_minutes: u32,
    slots: Vec<NaiveTime>,
}

impl TimeGrid {
    pub fn new(
        window_start: NaiveTime,
        window_end: NaiveTime,
        step_minutes: u32,
    ) -> Result<Self, GridError> {
        if step_minutes == 0 {
            return Err(GridError::ZeroStep);
        }
        if window_start >= window_end {
            return Err(GridError::EmptyWindow {
                start: format_hm(window_start),
                end: format_hm(window_end),
            });
        }
        let step = Duration::minutes(i64::from(step_minutes));
        let mut slots = Vec::new();
        let mut t = window_start;
        while t < window_end {
            slots.push(t);
            let (next, wrapped) = t.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            t = next;
        }
        Ok(Self {
            step_minutes,
            slots,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn slot_time(&self, index: usize) -> Option<NaiveTime> {
        self.slots.get(index).copied()
    }

    pub fn index_of(&self, time: NaiveTime) -> Option<usize> {
        self.slots.binary_search(&time).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveTime> + '_ {
        self.slots.iter().copied()
    }

    /// Row labels for the slot column, e.g. `8:00`, `8:30`, ...
    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().copied().map(format_hm).collect()
    }
}
