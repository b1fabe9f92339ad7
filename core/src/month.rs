//! Calendar months and date parsing.
//!
//! A `Month` is always stored as the first day of its month. All month
//! arithmetic is calendar arithmetic (year * 12 + month), never elapsed days.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Month(NaiveDate);

impl Month {
    /// Truncate any date to the first day of its month.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Position on a continuous month axis: year * 12 + zero-based month.
    pub fn ordinal(&self) -> i64 {
        self.0.year() as i64 * 12 + self.0.month0() as i64
    }

    fn from_ordinal(ordinal: i64) -> Option<Self> {
        let year = i32::try_from(ordinal.div_euclid(12)).ok()?;
        let month0 = ordinal.rem_euclid(12) as u32;
        Self::new(year, month0 + 1)
    }

    /// The following calendar month.
    pub fn succ(&self) -> Option<Self> {
        self.add_months(1)
    }

    pub fn add_months(&self, months: u32) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + months as i64)
    }

    /// Whole calendar months from `earlier` to `self`. Negative if `earlier`
    /// is after `self`.
    pub fn months_since(&self, earlier: Month) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    /// Every month from `start` to `end`, both inclusive. Empty if
    /// `start > end`.
    pub fn range_inclusive(start: Month, end: Month) -> impl Iterator<Item = Month> {
        (start.ordinal()..=end.ordinal()).filter_map(Month::from_ordinal)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date or timestamp string into its calendar date.
///
/// Accepts ISO dates, ISO timestamps (space or `T` separated, optional
/// fractional seconds), RFC 3339, `YYYY/MM/DD`, `MM/DD/YYYY` and bare
/// `YYYY-MM` months.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Bare month: "2021-03"
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || month.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}
