//! Clinical dating inputs and gestational age.
//!
//! `ClinicalDates` is what intake records about a pregnancy: the last
//! menstrual period (with a reliability flag) and the first ultrasound
//! with the GA it reported. `GestationalAge` is the derived, arbitrated
//! value; it is recomputed whenever inputs or the reference date change.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar::{days_between, shift_days};

/// Days from dating origin to the estimated date of delivery (40 weeks).
pub const FULL_TERM_DAYS: i64 = 280;

/// Largest gestational age accepted as physically possible (45 weeks).
pub const MAX_GA_DAYS: i64 = 315;

/// Raw dating measurements for one booking attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalDates {
    /// First day of the last menstrual period.
    pub last_menstrual_period: Option<NaiveDate>,
    /// Whether the patient is confident about the LMP date.
    pub lmp_reliable: bool,
    /// Date of the first ultrasound.
    pub first_ultrasound_date: Option<NaiveDate>,
    /// GA reported by that ultrasound, whole weeks.
    pub ultrasound_ga_weeks: u32,
    /// GA reported by that ultrasound, extra days (0..=6).
    pub ultrasound_ga_days: u32,
}

impl ClinicalDates {
    /// Creates an empty record (no usable source).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the LMP date and its reliability.
    pub fn with_lmp(mut self, date: NaiveDate, reliable: bool) -> Self {
        self.last_menstrual_period = Some(date);
        self.lmp_reliable = reliable;
        self
    }

    /// Sets the first ultrasound and the GA it reported.
    pub fn with_ultrasound(mut self, date: NaiveDate, weeks: u32, days: u32) -> Self {
        self.first_ultrasound_date = Some(date);
        self.ultrasound_ga_weeks = weeks;
        self.ultrasound_ga_days = days;
        self
    }

    /// The LMP date, if present and reliable.
    pub fn usable_lmp(&self) -> Option<NaiveDate> {
        self.last_menstrual_period.filter(|_| self.lmp_reliable)
    }

    /// GA at the ultrasound date, in days.
    #[inline]
    pub fn ultrasound_ga_total_days(&self) -> i64 {
        i64::from(self.ultrasound_ga_weeks) * 7 + i64::from(self.ultrasound_ga_days)
    }
}

/// Which measurement the GA was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GaMethod {
    /// Last menstrual period.
    Lmp,
    /// First ultrasound.
    Ultrasound,
}

impl fmt::Display for GaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaMethod::Lmp => f.write_str("LMP"),
            GaMethod::Ultrasound => f.write_str("USG"),
        }
    }
}

/// Arbitrated gestational age as of a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestationalAge {
    /// GA in days (never negative).
    pub total_days: i64,
    /// Source measurement.
    pub method: GaMethod,
    /// Date this GA holds on.
    pub reference_date: NaiveDate,
}

impl GestationalAge {
    /// Creates a GA value.
    pub fn new(total_days: i64, method: GaMethod, reference_date: NaiveDate) -> Self {
        Self {
            total_days,
            method,
            reference_date,
        }
    }

    /// Completed weeks.
    #[inline]
    pub fn weeks(&self) -> i64 {
        self.total_days.div_euclid(7)
    }

    /// Days past the completed weeks (0..=6).
    #[inline]
    pub fn days(&self) -> i64 {
        self.total_days.rem_euclid(7)
    }

    /// The date at which this pregnancy was at GA 0.
    pub fn dating_origin(&self) -> NaiveDate {
        shift_days(self.reference_date, -self.total_days)
    }

    /// GA in days on another date (may be negative before the origin).
    pub fn days_at(&self, date: NaiveDate) -> i64 {
        self.total_days + days_between(self.reference_date, date)
    }

    /// The same pregnancy's GA on another date, same method.
    pub fn at(&self, date: NaiveDate) -> Self {
        Self::new(self.days_at(date), self.method, date)
    }

    /// Estimated date of delivery (40 weeks from the dating origin).
    pub fn due_date(&self) -> NaiveDate {
        shift_days(self.dating_origin(), FULL_TERM_DAYS)
    }
}

impl fmt::Display for GestationalAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}w{}d", self.weeks(), self.days())
    }
}
