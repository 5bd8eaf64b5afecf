//! Gestational age arbitration.
//!
//! Derives one gestational age from two possibly conflicting measurements:
//! the last menstrual period (LMP) and the first ultrasound (USG).
//!
//! # Algorithm
//!
//! 1. Ultrasound present, LMP absent or unreliable: ultrasound.
//! 2. Both present: compare the two estimates at the reference date. If
//!    they differ by no more than the tolerance for the GA the ultrasound
//!    was taken at, keep LMP; otherwise use the ultrasound.
//! 3. Only a reliable LMP: LMP.
//! 4. Neither: [`GaError::NoUsableSource`].
//!
//! All functions are pure; the same inputs always produce the same result.
//!
//! # Reference
//! ACOG Committee Opinion 700 (2017), "Methods for Estimating the Due Date"

mod tolerance;

pub use tolerance::{ToleranceBand, ToleranceTable};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::GaError;
use crate::models::{days_between, ClinicalDates, GaMethod, GestationalAge, MAX_GA_DAYS};

/// Outcome of a dating decision with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatingAssessment {
    /// The arbitrated GA.
    pub ga: GestationalAge,
    /// GA by LMP at the reference date, if LMP was usable.
    pub lmp_estimate_days: Option<i64>,
    /// GA by ultrasound at the reference date, if recorded.
    pub ultrasound_estimate_days: Option<i64>,
    /// |LMP − ultrasound| when both were available.
    pub discrepancy_days: Option<i64>,
    /// Tolerance applied when both were available.
    pub tolerance_days: Option<u32>,
    /// Human-readable account of the decision.
    pub justification: String,
}

/// Gestational age calculator with a configurable tolerance table.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use u_gestation::gestation::GaCalculator;
/// use u_gestation::models::{ClinicalDates, GaMethod};
///
/// let lmp = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let reference = NaiveDate::from_ymd_opt(2025, 4, 11).unwrap();
/// let dates = ClinicalDates::new().with_lmp(lmp, true);
///
/// let ga = GaCalculator::new().compute_ga(&dates, reference).unwrap();
/// assert_eq!(ga.method, GaMethod::Lmp);
/// assert_eq!(ga.total_days, 100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GaCalculator {
    tolerance: ToleranceTable,
}

impl GaCalculator {
    /// Creates a calculator with the default tolerance table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tolerance table.
    pub fn with_tolerance(mut self, tolerance: ToleranceTable) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The tolerance table in use.
    pub fn tolerance(&self) -> &ToleranceTable {
        &self.tolerance
    }

    /// Arbitrated GA at `reference_date`.
    pub fn compute_ga(
        &self,
        dates: &ClinicalDates,
        reference_date: NaiveDate,
    ) -> Result<GestationalAge, GaError> {
        self.assess(dates, reference_date).map(|a| a.ga)
    }

    /// Arbitrated GA at `reference_date`, with both estimates and the
    /// reasoning that selected one of them.
    pub fn assess(
        &self,
        dates: &ClinicalDates,
        reference_date: NaiveDate,
    ) -> Result<DatingAssessment, GaError> {
        let ultrasound = match dates.first_ultrasound_date {
            Some(us_date) => {
                if dates.ultrasound_ga_days >= 7 {
                    return Err(GaError::InvalidDates(format!(
                        "ultrasound GA days must be 0..=6, got {}",
                        dates.ultrasound_ga_days
                    )));
                }
                if dates.ultrasound_ga_total_days() > MAX_GA_DAYS {
                    return Err(GaError::InvalidDates(format!(
                        "ultrasound GA {}w{}d exceeds {} days",
                        dates.ultrasound_ga_weeks, dates.ultrasound_ga_days, MAX_GA_DAYS
                    )));
                }
                Some(days_between(us_date, reference_date) + dates.ultrasound_ga_total_days())
            }
            None => None,
        };
        let lmp = dates
            .usable_lmp()
            .map(|lmp_date| days_between(lmp_date, reference_date));

        let assessment = match (lmp, ultrasound) {
            (None, None) => return Err(GaError::NoUsableSource),
            (None, Some(usg)) => {
                let why = if dates.last_menstrual_period.is_some() {
                    "LMP marked unreliable"
                } else {
                    "LMP not recorded"
                };
                DatingAssessment {
                    ga: GestationalAge::new(usg, GaMethod::Ultrasound, reference_date),
                    lmp_estimate_days: None,
                    ultrasound_estimate_days: Some(usg),
                    discrepancy_days: None,
                    tolerance_days: None,
                    justification: format!("{why}; dated by ultrasound"),
                }
            }
            (Some(lmp), None) => DatingAssessment {
                ga: GestationalAge::new(lmp, GaMethod::Lmp, reference_date),
                lmp_estimate_days: Some(lmp),
                ultrasound_estimate_days: None,
                discrepancy_days: None,
                tolerance_days: None,
                justification: "no ultrasound recorded; dated by reliable LMP".to_string(),
            },
            (Some(lmp), Some(usg)) => {
                let weeks = dates.ultrasound_ga_weeks;
                let tolerance = self.tolerance.tolerance_days(weeks);
                let discrepancy = (lmp - usg).abs();
                let (total, method, verdict) = if discrepancy <= i64::from(tolerance) {
                    (lmp, GaMethod::Lmp, "within tolerance; LMP kept")
                } else {
                    (usg, GaMethod::Ultrasound, "beyond tolerance; ultrasound used")
                };
                DatingAssessment {
                    ga: GestationalAge::new(total, method, reference_date),
                    lmp_estimate_days: Some(lmp),
                    ultrasound_estimate_days: Some(usg),
                    discrepancy_days: Some(discrepancy),
                    tolerance_days: Some(tolerance),
                    justification: format!(
                        "LMP and ultrasound differ by {discrepancy} days, tolerance {tolerance} days \
                         for an ultrasound at {weeks} weeks: {verdict}"
                    ),
                }
            }
        };

        if assessment.ga.total_days < 0 {
            return Err(GaError::InvalidDates(format!(
                "{} GA is negative ({} days) at {}",
                assessment.ga.method, assessment.ga.total_days, reference_date
            )));
        }
        if assessment.ga.total_days > MAX_GA_DAYS {
            return Err(GaError::InvalidDates(format!(
                "{} GA of {} days at {} exceeds {} days",
                assessment.ga.method, assessment.ga.total_days, reference_date, MAX_GA_DAYS
            )));
        }

        debug!(
            "GA {} by {} at {}: {}",
            assessment.ga, assessment.ga.method, reference_date, assessment.justification
        );
        Ok(assessment)
    }
}

/// Arbitrated GA at `reference_date` using the default tolerance table.
pub fn compute_ga(
    dates: &ClinicalDates,
    reference_date: NaiveDate,
) -> Result<GestationalAge, GaError> {
    GaCalculator::new().compute_ga(dates, reference_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shift_days;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_lmp_only() {
        let d0 = d(2025, 1, 1);
        let dates = ClinicalDates::new().with_lmp(d0, true);
        let ga = compute_ga(&dates, shift_days(d0, 100)).unwrap();
        assert_eq!(ga.method, GaMethod::Lmp);
        assert_eq!(ga.total_days, 100);
    }

    #[test]
    fn test_ultrasound_overrides_discrepant_lmp() {
        // US at D0+70 reported 12w0d → 84 + 30 = 114 at D0+100; LMP says 100.
        let d0 = d(2025, 1, 1);
        let dates = ClinicalDates::new()
            .with_lmp(d0, true)
            .with_ultrasound(shift_days(d0, 70), 12, 0);
        let a = GaCalculator::new().assess(&dates, shift_days(d0, 100)).unwrap();

        assert_eq!(a.ga.method, GaMethod::Ultrasound);
        assert_eq!(a.ga.total_days, 114);
        assert_eq!(a.discrepancy_days, Some(14));
        assert_eq!(a.tolerance_days, Some(10));
        assert!(a.justification.contains("ultrasound used"));
    }

    #[test]
    fn test_lmp_kept_within_tolerance() {
        let d0 = d(2025, 1, 1);
        // US at D0+70 reported 10w2d → 72 at US, 102 at D0+100; gap 2 <= 7.
        let dates = ClinicalDates::new()
            .with_lmp(d0, true)
            .with_ultrasound(shift_days(d0, 70), 10, 2);
        let a = GaCalculator::new().assess(&dates, shift_days(d0, 100)).unwrap();
        assert_eq!(a.ga.method, GaMethod::Lmp);
        assert_eq!(a.ga.total_days, 100);
        assert_eq!(a.ultrasound_estimate_days, Some(102));
    }

    #[test]
    fn test_boundary_equal_to_tolerance_keeps_lmp() {
        let d0 = d(2025, 1, 1);
        // 8w at US → tolerance 5; US estimate 105 vs LMP 100.
        let dates = ClinicalDates::new()
            .with_lmp(d0, true)
            .with_ultrasound(shift_days(d0, 51), 8, 0);
        let ga = compute_ga(&dates, shift_days(d0, 100)).unwrap();
        assert_eq!(ga.method, GaMethod::Lmp);
    }

    #[test]
    fn test_unreliable_lmp_uses_ultrasound() {
        let d0 = d(2025, 1, 1);
        let dates = ClinicalDates::new()
            .with_lmp(d0, false)
            .with_ultrasound(shift_days(d0, 60), 9, 0);
        let a = GaCalculator::new().assess(&dates, shift_days(d0, 60)).unwrap();
        assert_eq!(a.ga.method, GaMethod::Ultrasound);
        assert_eq!(a.ga.total_days, 63);
        assert!(a.justification.starts_with("LMP marked unreliable"));
    }

    #[test]
    fn test_no_usable_source() {
        let dates = ClinicalDates::new().with_lmp(d(2025, 1, 1), false);
        assert_eq!(
            compute_ga(&dates, d(2025, 4, 1)),
            Err(GaError::NoUsableSource)
        );
        assert_eq!(
            compute_ga(&ClinicalDates::new(), d(2025, 4, 1)),
            Err(GaError::NoUsableSource)
        );
    }

    #[test]
    fn test_invalid_ultrasound_days() {
        let dates = ClinicalDates::new().with_ultrasound(d(2025, 3, 1), 10, 7);
        assert!(matches!(
            compute_ga(&dates, d(2025, 4, 1)),
            Err(GaError::InvalidDates(_))
        ));
    }

    #[test]
    fn test_negative_ga_rejected() {
        let dates = ClinicalDates::new().with_lmp(d(2025, 5, 1), true);
        assert!(matches!(
            compute_ga(&dates, d(2025, 4, 1)),
            Err(GaError::InvalidDates(_))
        ));
    }

    #[test]
    fn test_implausible_ultrasound_rejected() {
        let dates = ClinicalDates::new().with_ultrasound(d(2025, 3, 1), 20_000_000, 0);
        assert!(matches!(
            compute_ga(&dates, d(2025, 4, 1)),
            Err(GaError::InvalidDates(_))
        ));
    }

    #[test]
    fn test_ga_beyond_term_rejected() {
        // Reliable LMP two years back.
        let dates = ClinicalDates::new().with_lmp(d(2023, 4, 1), true);
        assert!(matches!(
            compute_ga(&dates, d(2025, 4, 1)),
            Err(GaError::InvalidDates(_))
        ));

        // 45w0d is still accepted.
        let lmp = d(2025, 1, 1);
        let ga = compute_ga(
            &ClinicalDates::new().with_lmp(lmp, true),
            shift_days(lmp, MAX_GA_DAYS),
        )
        .unwrap();
        assert_eq!(ga.total_days, 315);
    }

    #[test]
    fn test_custom_tolerance() {
        let d0 = d(2025, 1, 1);
        let dates = ClinicalDates::new()
            .with_lmp(d0, true)
            .with_ultrasound(shift_days(d0, 70), 12, 0);
        let calc = GaCalculator::new()
            .with_tolerance(ToleranceTable::new(vec![ToleranceBand::open(0, 30)]));
        let ga = calc.compute_ga(&dates, shift_days(d0, 100)).unwrap();
        assert_eq!(ga.method, GaMethod::Lmp);
    }
}
