//! Target date derivation.
//!
//! # Algorithm
//!
//! 1. `days_to_ideal = ideal_weeks * 7 - ga_days(reference_date)`.
//! 2. `raw = reference_date + days_to_ideal`.
//! 3. Skip forward past the no-booking weekday.
//! 4. If the result is closer than the minimum lead time to the reference
//!    date, use `reference_date + minimum_lead_time_days` and skip the
//!    no-booking weekday again.

use chrono::{NaiveDate, Weekday};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::models::{days_between, shift_days, skip_weekday, GestationalAge};
use crate::protocol::ProtocolMatch;

/// A target date and how it was adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDate {
    /// The final target date.
    pub date: NaiveDate,
    /// The date at which the ideal GA is reached, before any adjustment.
    pub raw_date: NaiveDate,
    /// Whether the no-booking weekday pushed the date forward.
    pub adjusted_for_weekday: bool,
    /// Whether the minimum lead time replaced the date.
    pub adjusted_for_lead_time: bool,
}

/// Computes target dates from GA and protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDateCalculator {
    minimum_lead_time_days: u32,
    no_booking_weekday: Weekday,
}

impl Default for TargetDateCalculator {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl TargetDateCalculator {
    /// Creates a calculator with default rules (10 days lead, no Sundays).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a calculator from resolver configuration.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            minimum_lead_time_days: config.minimum_lead_time_days,
            no_booking_weekday: config.no_booking_weekday,
        }
    }

    /// Sets the minimum lead time.
    pub fn with_minimum_lead_time(mut self, days: u32) -> Self {
        self.minimum_lead_time_days = days;
        self
    }

    /// Sets the weekday on which nothing is booked.
    pub fn with_no_booking_weekday(mut self, weekday: Weekday) -> Self {
        self.no_booking_weekday = weekday;
        self
    }

    /// Target date with its adjustment breakdown.
    ///
    /// `current_ga` is projected to `reference_date` first when its own
    /// reference date differs.
    pub fn calculate(
        &self,
        current_ga: &GestationalAge,
        ideal: &ProtocolMatch,
        reference_date: NaiveDate,
    ) -> TargetDate {
        let days_to_ideal = ideal.ideal_ga_days() - current_ga.days_at(reference_date);
        let raw_date = shift_days(reference_date, days_to_ideal);
        let mut date = skip_weekday(raw_date, self.no_booking_weekday);
        let adjusted_for_weekday = date != raw_date;

        let lead_time = i64::from(self.minimum_lead_time_days);
        let adjusted_for_lead_time = days_between(reference_date, date) < lead_time;
        if adjusted_for_lead_time {
            date = skip_weekday(shift_days(reference_date, lead_time), self.no_booking_weekday);
        }

        debug!(
            "target for {} ({}w): raw {}, final {} (weekday: {}, lead time: {})",
            current_ga,
            ideal.ideal_ga_weeks,
            raw_date,
            date,
            adjusted_for_weekday,
            adjusted_for_lead_time
        );

        TargetDate {
            date,
            raw_date,
            adjusted_for_weekday,
            adjusted_for_lead_time,
        }
    }
}

/// Target date under the default rules.
pub fn target_date(
    current_ga: &GestationalAge,
    ideal: &ProtocolMatch,
    reference_date: NaiveDate,
) -> NaiveDate {
    TargetDateCalculator::new()
        .calculate(current_ga, ideal, reference_date)
        .date
}
