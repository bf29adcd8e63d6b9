use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::model::{NO_TRADE_KEY, PriceHistory};

/// Ordered close sequences for one instrument. Index 0 is the oldest bar,
/// the last index is the most recent ("today").
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub daily: Vec<f64>,
    pub weekly: Vec<f64>,
    pub dates: Vec<String>,
    /// Maximum observed trading days per week, floor 1.
    pub week_len: usize,
}

impl PriceSeries {
    /// Approximate how many weekly bars back a daily offset reaches.
    /// `ceil(days_ago / week_len)` only: holidays and exchange closures
    /// shift the mapping, so a "week ago" is nominal, not calendar-exact.
    pub fn week_index(&self, days_ago: usize) -> usize {
        days_ago.div_ceil(self.week_len)
    }
}

/// Build daily and weekly close series from a date-keyed history.
///
/// A new week starts when the weekday number decreases relative to the
/// previous parsed date (wraparound detection rather than calendar-week
/// lookup); each boundary appends the previous day's close as the finished
/// week's value. If the newest date did not itself start a week, one
/// trailing weekly value is appended for the week in progress.
pub fn build(history: &PriceHistory) -> PriceSeries {
    let mut daily = Vec::with_capacity(history.len());
    let mut weekly = Vec::new();
    let mut dates = Vec::with_capacity(history.len());
    let mut week_len = 1usize;

    if history.is_empty() {
        return PriceSeries { daily, weekly, dates, week_len };
    }

    let mut last_weekday = 0usize;
    let mut price = 0.0f64;
    let mut prev_price;
    let mut added_week = false;

    for (day, bar) in history {
        added_week = false;
        prev_price = price;
        dates.push(day.clone());
        price = bar.close;
        daily.push(price);

        if day == NO_TRADE_KEY {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            debug!(key = %day, "unparseable date key, excluded from week detection");
            continue;
        };
        let weekday = date.weekday().num_days_from_monday() as usize;
        if weekday < last_weekday {
            added_week = true;
            weekly.push(prev_price);
            if week_len < last_weekday {
                week_len = last_weekday + 1;
            }
        }
        last_weekday = weekday;
    }

    if !added_week {
        // Week in progress: carries the previous close, matching the
        // boundary rule above.
        let prev = if daily.len() >= 2 { daily[daily.len() - 2] } else { 0.0 };
        weekly.push(prev);
    }

    PriceSeries { daily, weekly, dates, week_len }
}
