use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use std::collections::HashMap;
use tracing::warn;

/// Chronological schedule dates with O(1) lookups in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateIndex {
    dates: Vec<NaiveDate>,
    orders: HashMap<NaiveDate, usize>,
    /// `(month, day)` to order; `None` when the label names more than one date.
    shorts: HashMap<(u32, u32), Option<usize>>,
}

impl DateIndex {
    /// Orders are derived from position. Out-of-order or repeated input is
    /// sorted and deduplicated so the chronological invariant always holds.
    pub fn build<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            warn!(count = dates.len(), "date list not strictly chronological; reordering");
            dates.sort_unstable();
            dates.dedup();
        }
        let orders = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut shorts = HashMap::new();
        for (i, d) in dates.iter().enumerate() {
            shorts
                .entry((d.month(), d.day()))
                .and_modify(|slot| *slot = None)
                .or_insert(Some(i));
        }
        Self {
            dates,
            orders,
            shorts,
        }
    }

    pub fn order_of(&self, date: NaiveDate) -> Option<usize> {
        self.orders.get(&date).copied()
    }

    /// Time of day is ignored.
    pub fn order_of_datetime(&self, at: NaiveDateTime) -> Option<usize> {
        self.order_of(at.date())
    }

    /// Lookup by the sheet-name form `M/d` (e.g. `8/25`). The label carries
    /// no year, so a schedule holding the same `M/d` twice resolves to `None`.
    pub fn order_of_short(&self, short: &str) -> Option<usize> {
        let (m, d) = short.trim().split_once('/')?;
        let key: (u32, u32) = (m.parse().ok()?, d.parse().ok()?);
        self.shorts.get(&key).copied().flatten()
    }

    pub fn date_at(&self, order: usize) -> Option<NaiveDate> {
        self.dates.get(order).copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}

/// `M/d`, the name each daily sheet carries.
pub fn short_label(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

/// Every date in `from..=to`, optionally skipping Saturdays and Sundays.
/// Empty when `to` is before `from`.
pub fn date_range(from: NaiveDate, to: NaiveDate, weekdays_only: bool) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| !weekdays_only || !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
