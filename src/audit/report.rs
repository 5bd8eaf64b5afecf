//! Audit pass results and summary metrics.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Cases | Overbooked (facility, date) pairs detected |
//! | Surplus | Bookings beyond capacity across all cases |
//! | Relocated | Surplus bookings moved to another date |
//! | Manual review | Surplus bookings with no date in the window |
//! | Kept | Surplus bookings that fit on their date once occupancy was recounted |
//! | Failures | Store writes that failed |
//! | Mean / max shift | Over relocated bookings, in absolute days |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::models::BookingId;

/// An overbooked (facility, date) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverbookingCase {
    /// Facility name as found on the first booking of the group.
    pub facility: String,
    /// Overbooked date.
    pub date: NaiveDate,
    /// Day-type capacity on that date.
    pub capacity: u32,
    /// Active bookings on that date, oldest registration first.
    pub bookings: Vec<BookingId>,
    /// Bookings beyond capacity (tail of `bookings`).
    pub surplus: Vec<BookingId>,
}

impl OverbookingCase {
    /// Number of bookings over capacity.
    pub fn overflow(&self) -> usize {
        self.surplus.len()
    }
}

/// A booking moved off an overbooked date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// Booking moved.
    pub id: BookingId,
    /// Facility.
    pub facility: String,
    /// Date before the move.
    pub original_date: NaiveDate,
    /// Date after the move.
    pub new_date: NaiveDate,
    /// Signed offset in days.
    pub shift_days: i32,
}

/// A surplus booking left on its date for a human to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualReview {
    /// Booking concerned.
    pub id: BookingId,
    /// Facility.
    pub facility: String,
    /// The overbooked date it stays on.
    pub date: NaiveDate,
    /// Whether an earlier pass had already flagged it (no new note written).
    pub already_flagged: bool,
}

/// A store write that failed; the booking was left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistFailure {
    /// Booking concerned.
    pub id: BookingId,
    /// Date the booking stays on.
    pub date: NaiveDate,
    /// Store error.
    pub error: PersistError,
}

/// Everything one audit pass detected and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Timestamp written into notes during this pass.
    pub audited_at: DateTime<Utc>,
    /// Overbooked pairs, ordered by facility then date.
    pub cases: Vec<OverbookingCase>,
    /// Successful relocations.
    pub relocated: Vec<Relocation>,
    /// Bookings needing manual review.
    pub manual_review: Vec<ManualReview>,
    /// Surplus bookings the slot search placed back on their own date.
    #[serde(default)]
    pub kept_after_recount: Vec<BookingId>,
    /// Failed store writes.
    pub failures: Vec<PersistFailure>,
    /// Facilities with active bookings but no capacity row.
    pub unconfigured_facilities: Vec<String>,
    /// Whether the pass was a dry run.
    #[serde(default)]
    pub simulated: bool,
}

impl AuditReport {
    pub(crate) fn new(audited_at: DateTime<Utc>) -> Self {
        Self {
            audited_at,
            cases: Vec::new(),
            relocated: Vec::new(),
            manual_review: Vec::new(),
            kept_after_recount: Vec::new(),
            failures: Vec::new(),
            unconfigured_facilities: Vec::new(),
            simulated: false,
        }
    }

    /// Whether no overbooking was found.
    pub fn is_clean(&self) -> bool {
        self.cases.is_empty()
    }

    /// Summary metrics.
    pub fn summary(&self) -> AuditSummary {
        AuditSummary::calculate(self)
    }
}

/// Aggregate metrics of one audit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Overbooked pairs.
    pub cases: usize,
    /// Surplus bookings across all cases.
    pub surplus_bookings: usize,
    /// Bookings relocated.
    pub relocated: usize,
    /// Bookings needing manual review (including previously flagged).
    pub manual_review: usize,
    /// Surplus bookings kept on their date after a recount.
    pub kept_after_recount: usize,
    /// Failed store writes.
    pub failures: usize,
    /// Mean absolute shift of relocated bookings (days).
    pub mean_abs_shift_days: f64,
    /// Largest absolute shift (days).
    pub max_abs_shift_days: u32,
}

impl AuditSummary {
    /// Computes the summary of a report.
    pub fn calculate(report: &AuditReport) -> Self {
        let surplus_bookings = report.cases.iter().map(OverbookingCase::overflow).sum();

        let mut total_shift: u64 = 0;
        let mut max_shift: u32 = 0;
        for r in &report.relocated {
            let shift = r.shift_days.unsigned_abs();
            total_shift += u64::from(shift);
            max_shift = max_shift.max(shift);
        }

        let mean_abs_shift_days = if report.relocated.is_empty() {
            0.0
        } else {
            total_shift as f64 / report.relocated.len() as f64
        };

        Self {
            cases: report.cases.len(),
            surplus_bookings,
            relocated: report.relocated.len(),
            manual_review: report.manual_review.len(),
            kept_after_recount: report.kept_after_recount.len(),
            failures: report.failures.len(),
            mean_abs_shift_days,
            max_abs_shift_days: max_shift,
        }
    }

    /// Whether every surplus booking was relocated or fits where it is.
    pub fn fully_corrected(&self) -> bool {
        self.relocated + self.kept_after_recount == self.surplus_bookings
    }
}
