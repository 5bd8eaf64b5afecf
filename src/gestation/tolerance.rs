//! LMP/ultrasound discrepancy tolerance.
//!
//! First-trimester ultrasound is most accurate, so the allowed gap between
//! the LMP estimate and the ultrasound estimate widens with the GA the
//! ultrasound was taken at.
//!
//! | Ultrasound GA (weeks) | Tolerance (days) |
//! |-----------------------|------------------|
//! | < 8                   | 5                |
//! | 8–9                   | 5                |
//! | 10–11                 | 7                |
//! | 12–13                 | 10               |
//! | 14–15                 | 14               |
//! | 16–19                 | 21               |
//! | 20+                   | 21               |
//!
//! # Reference
//! ACOG Committee Opinion 700 (2017), "Methods for Estimating the Due Date"

use serde::{Deserialize, Serialize};

/// One row of the tolerance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceBand {
    /// Lowest ultrasound GA week covered (inclusive).
    pub min_weeks: u32,
    /// Highest week covered (inclusive); `None` means open-ended.
    #[serde(default)]
    pub max_weeks: Option<u32>,
    /// Allowed |LMP − ultrasound| in days.
    pub tolerance_days: u32,
}

impl ToleranceBand {
    /// Closed band `[min_weeks, max_weeks]`.
    pub fn new(min_weeks: u32, max_weeks: u32, tolerance_days: u32) -> Self {
        Self {
            min_weeks,
            max_weeks: Some(max_weeks),
            tolerance_days,
        }
    }

    /// Open band `[min_weeks, ∞)`.
    pub fn open(min_weeks: u32, tolerance_days: u32) -> Self {
        Self {
            min_weeks,
            max_weeks: None,
            tolerance_days,
        }
    }

    /// Whether `weeks` falls inside this band.
    pub fn contains(&self, weeks: u32) -> bool {
        weeks >= self.min_weeks && self.max_weeks.map_or(true, |max| weeks <= max)
    }
}

fn default_below_range_days() -> u32 {
    5
}

/// Step function from ultrasound GA weeks to tolerance days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceTable {
    /// Bands in ascending order of `min_weeks`.
    pub bands: Vec<ToleranceBand>,
    /// Tolerance below the first band.
    #[serde(default = "default_below_range_days")]
    pub below_range_days: u32,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self {
            bands: vec![
                ToleranceBand::new(8, 9, 5),
                ToleranceBand::new(10, 11, 7),
                ToleranceBand::new(12, 13, 10),
                ToleranceBand::new(14, 15, 14),
                ToleranceBand::new(16, 19, 21),
                ToleranceBand::open(20, 21),
            ],
            below_range_days: default_below_range_days(),
        }
    }
}

impl ToleranceTable {
    /// Creates a table from bands.
    ///
    /// See [`validate_tolerance_table`](crate::validation::validate_tolerance_table)
    /// for the structural checks applied on configuration load.
    pub fn new(bands: Vec<ToleranceBand>) -> Self {
        Self {
            bands,
            below_range_days: default_below_range_days(),
        }
    }

    /// Sets the tolerance used below the first band.
    pub fn with_below_range_days(mut self, days: u32) -> Self {
        self.below_range_days = days;
        self
    }

    /// Tolerance in days for an ultrasound taken at `weeks`.
    ///
    /// Weeks in a gap between bands, or past a closed last band, take the
    /// nearest lower band.
    pub fn tolerance_days(&self, weeks: u32) -> u32 {
        if let Some(band) = self.bands.iter().find(|b| b.contains(weeks)) {
            return band.tolerance_days;
        }
        self.bands
            .iter()
            .filter(|b| b.min_weeks <= weeks)
            .max_by_key(|b| b.min_weeks)
            .map_or(self.below_range_days, |b| b.tolerance_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let t = ToleranceTable::default();
        assert_eq!(t.tolerance_days(8), 5);
        assert_eq!(t.tolerance_days(9), 5);
        assert_eq!(t.tolerance_days(10), 7);
        assert_eq!(t.tolerance_days(12), 10);
        assert_eq!(t.tolerance_days(13), 10);
        assert_eq!(t.tolerance_days(15), 14);
        assert_eq!(t.tolerance_days(16), 21);
        assert_eq!(t.tolerance_days(40), 21);
    }

    #[test]
    fn test_below_first_band() {
        let t = ToleranceTable::default();
        assert_eq!(t.tolerance_days(0), 5);
        assert_eq!(t.tolerance_days(7), 5);

        let t = t.with_below_range_days(3);
        assert_eq!(t.tolerance_days(6), 3);
    }

    #[test]
    fn test_gap_uses_lower_band() {
        let t = ToleranceTable::new(vec![
            ToleranceBand::new(8, 9, 5),
            ToleranceBand::new(14, 15, 14),
        ]);
        assert_eq!(t.tolerance_days(11), 5);
        assert_eq!(t.tolerance_days(30), 14);
    }

    #[test]
    fn test_monotone_over_range() {
        let t = ToleranceTable::default();
        let mut prev = 0;
        for w in 0..45 {
            let cur = t.tolerance_days(w);
            assert!(cur >= prev, "tolerance dropped at week {w}");
            prev = cur;
        }
    }
}
