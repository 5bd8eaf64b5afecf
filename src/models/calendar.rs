//! Calendar and date window models.
//!
//! Defines day-type classification (weekday, Saturday, Sunday) used to
//! pick a facility's daily capacity, inclusive date windows for bounded
//! searches, and small date arithmetic helpers.
//!
//! # Time Model
//! All dates are calendar dates (`NaiveDate`) with no time-of-day and no
//! time zone. The consumer decides which local calendar a date belongs to.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Capacity class of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayType {
    /// Monday through Friday.
    Weekday,
    /// Saturday.
    Saturday,
    /// Sunday.
    Sunday,
}

impl DayType {
    /// Classifies a date.
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => DayType::Saturday,
            Weekday::Sun => DayType::Sunday,
            _ => DayType::Weekday,
        }
    }
}

/// An inclusive date interval [first, last].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    /// First day (inclusive).
    pub first: NaiveDate,
    /// Last day (inclusive).
    pub last: NaiveDate,
}

impl DateWindow {
    /// Creates a new window.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self { first, last }
    }

    /// Symmetric window of `radius_days` around `center`.
    pub fn around(center: NaiveDate, radius_days: u32) -> Self {
        let radius = i64::from(radius_days);
        Self {
            first: shift_days(center, -radius),
            last: shift_days(center, radius),
        }
    }

    /// Number of days in the window (0 if inverted).
    #[inline]
    pub fn len_days(&self) -> i64 {
        (days_between(self.first, self.last) + 1).max(0)
    }

    /// Whether a date falls within this window.
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    /// Whether two windows share at least one day.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Moves a date by a signed number of days, saturating at the calendar
/// bounds.
#[inline]
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
}

/// Signed number of days from `from` to `to`.
#[inline]
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Advances `date` one day at a time until it no longer falls on `blocked`.
///
/// Never moves backward. With a single blocked weekday this advances at
/// most one day; at the last representable date it stays put.
pub fn skip_weekday(date: NaiveDate, blocked: Weekday) -> NaiveDate {
    let mut current = date;
    while current.weekday() == blocked {
        let next = shift_days(current, 1);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
