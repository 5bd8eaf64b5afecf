//! Booking pipeline: dating, protocol, target date, slot.
//!
//! # Algorithm
//!
//! 1. Arbitrate GA at the request's reference date.
//! 2. Select the most urgent protocol among the diagnosis tokens.
//! 3. Derive the target date.
//! 4. Search a slot at the requested facility.
//! 5. Raise review alerts (intended GA mismatch, GA deviation on the
//!    scheduled date, drift beyond the protocol margin, no slot).
//!
//! The drift of the booked date from the date the ideal GA is reached is
//! graded against the protocol margin: within the margin, within twice
//! the margin, or outside.
//!
//! GA errors abort the pipeline; a missing slot does not.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{CapacityResolver, OccupancyLookup, SlotResult, TargetDate, TargetDateCalculator};
use crate::config::{ResolverConfig, SchedulingConfig};
use crate::error::ScheduleError;
use crate::gestation::{DatingAssessment, GaCalculator};
use crate::models::{
    days_between, Booking, BookingId, CapacityTable, ClinicalDates, FacilityCapacity,
    GestationalAge, NoteEntry,
};
use crate::protocol::{ProtocolMatch, ProtocolTable};
use crate::store::BookingLedger;

/// Input for one booking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Identifier the booking will carry.
    pub id: BookingId,
    /// Requested facility.
    pub facility: String,
    /// Dating measurements.
    pub clinical: ClinicalDates,
    /// Normalized diagnosis/procedure tokens.
    pub diagnosis_tokens: BTreeSet<String>,
    /// Registration time (FIFO key for later audits).
    pub registered_at: DateTime<Utc>,
    /// Date the request is evaluated on.
    pub reference_date: NaiveDate,
    /// GA the requester had in mind, if stated.
    pub intended_ga_weeks: Option<u32>,
}

impl BookingRequest {
    /// Creates a request with no diagnosis tokens.
    pub fn new(
        id: impl Into<BookingId>,
        facility: impl Into<String>,
        clinical: ClinicalDates,
        reference_date: NaiveDate,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            facility: facility.into(),
            clinical,
            diagnosis_tokens: BTreeSet::new(),
            registered_at,
            reference_date,
            intended_ga_weeks: None,
        }
    }

    /// Adds a diagnosis token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.diagnosis_tokens.insert(token.into());
        self
    }

    /// Adds several diagnosis tokens.
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diagnosis_tokens
            .extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Sets the GA the requester intended.
    pub fn with_intended_ga(mut self, weeks: u32) -> Self {
        self.intended_ga_weeks = Some(weeks);
        self
    }
}

/// Drift of a booked date from the ideal date, relative to the protocol
/// margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalGrade {
    /// At most one margin away.
    Within,
    /// At most two margins away.
    Near,
    /// More than two margins away.
    Outside,
}

impl IntervalGrade {
    /// Grades a signed offset in days.
    pub fn classify(interval_days: i64, margin_days: u32) -> Self {
        let drift = interval_days.unsigned_abs();
        let margin = u64::from(margin_days);
        if drift <= margin {
            IntervalGrade::Within
        } else if drift <= margin * 2 {
            IntervalGrade::Near
        } else {
            IntervalGrade::Outside
        }
    }
}

/// Something a human should look at before approving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewAlert {
    /// The requester's intended GA differs from the protocol.
    IntendedGaMismatch {
        /// Requested weeks.
        intended_weeks: u32,
        /// Protocol weeks.
        protocol_weeks: u32,
    },
    /// The GA on the scheduled date is far from the ideal GA.
    GaDeviation {
        /// GA on the scheduled date, days.
        ga_at_slot_days: i64,
        /// Ideal GA, days.
        ideal_days: i64,
    },
    /// The booked date is further from the ideal date than the protocol
    /// margin allows.
    OutsideMargin {
        /// Booked date minus ideal date, days.
        interval_days: i64,
        /// Protocol margin, days.
        margin_days: u32,
    },
    /// No free date within the search window.
    NoSlotFound {
        /// Target date the search started from.
        target: NaiveDate,
        /// Search radius.
        window_days: u32,
    },
}

impl fmt::Display for ReviewAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAlert::IntendedGaMismatch {
                intended_weeks,
                protocol_weeks,
            } => write!(
                f,
                "requested GA {intended_weeks}w differs from protocol GA {protocol_weeks}w"
            ),
            ReviewAlert::GaDeviation {
                ga_at_slot_days,
                ideal_days,
            } => write!(
                f,
                "GA on scheduled date is {}w{}d, ideal {}w ({:+} days)",
                ga_at_slot_days.div_euclid(7),
                ga_at_slot_days.rem_euclid(7),
                ideal_days / 7,
                ga_at_slot_days - ideal_days
            ),
            ReviewAlert::OutsideMargin {
                interval_days,
                margin_days,
            } => write!(
                f,
                "booked {interval_days:+} days from the ideal date, margin ±{margin_days} days"
            ),
            ReviewAlert::NoSlotFound {
                target,
                window_days,
            } => write!(f, "no slot within ±{window_days} days of {target}"),
        }
    }
}

/// Everything the pipeline decided for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPlan {
    /// Booking identifier.
    pub id: BookingId,
    /// Facility.
    pub facility: String,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// Dating decision.
    pub dating: DatingAssessment,
    /// Governing protocol.
    pub protocol: ProtocolMatch,
    /// Target date breakdown.
    pub target: TargetDate,
    /// Slot search outcome.
    pub slot: SlotResult,
    /// Estimated date of delivery.
    pub due_date: NaiveDate,
    /// GA on the scheduled date.
    pub ga_at_slot: Option<GestationalAge>,
    /// Scheduled date minus the date the ideal GA is reached.
    pub interval_days: Option<i64>,
    /// Review alerts.
    pub alerts: Vec<ReviewAlert>,
}

impl BookingPlan {
    /// GA at the reference date.
    pub fn ga(&self) -> GestationalAge {
        self.dating.ga
    }

    /// The scheduled date, if a slot was found.
    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        self.slot.date()
    }

    /// Drift of the scheduled date graded against the protocol margin.
    pub fn interval_grade(&self) -> Option<IntervalGrade> {
        self.interval_days
            .map(|days| IntervalGrade::classify(days, self.protocol.margin_days))
    }

    /// Whether any alert was raised.
    pub fn needs_review(&self) -> bool {
        !self.alerts.is_empty()
    }

    fn booking_on(&self, date: NaiveDate) -> Booking {
        let mut booking = Booking::new(
            self.id.clone(),
            self.facility.clone(),
            date,
            self.registered_at,
            self.dating.ga,
        );
        for alert in &self.alerts {
            booking.flag_for_review(NoteEntry::remark(self.registered_at, alert.to_string()));
        }
        booking
    }

    /// A pending booking for the resolved slot, carrying alerts as notes.
    pub fn into_booking(self) -> Option<Booking> {
        self.scheduled_date().map(|date| self.booking_on(date))
    }
}

/// Runs the booking pipeline against fixed tables.
///
/// # Example
///
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use u_gestation::config::SchedulingConfig;
/// use u_gestation::models::ClinicalDates;
/// use u_gestation::scheduler::{BookingRequest, BookingScheduler};
/// use u_gestation::store::BookingLedger;
///
/// let reference = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
/// let lmp = NaiveDate::from_ymd_opt(2024, 8, 5).unwrap(); // 30w0d on the reference date
/// let request = BookingRequest::new(
///     "B1",
///     "Salvalus",
///     ClinicalDates::new().with_lmp(lmp, true),
///     reference,
///     Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
/// )
/// .with_token("pre-eclampsia");
///
/// let scheduler = BookingScheduler::new(&SchedulingConfig::default());
/// let ledger = BookingLedger::new();
/// let plan = scheduler.book(&request, &ledger).unwrap();
///
/// assert_eq!(plan.scheduled_date(), NaiveDate::from_ymd_opt(2025, 4, 21));
/// assert!(!plan.needs_review());
/// assert_eq!(ledger.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BookingScheduler {
    config: ResolverConfig,
    protocols: ProtocolTable,
    capacities: CapacityTable,
    dating: GaCalculator,
    target: TargetDateCalculator,
    resolver: CapacityResolver,
}

impl Default for BookingScheduler {
    fn default() -> Self {
        Self::new(&SchedulingConfig::default())
    }
}

impl BookingScheduler {
    /// Creates a scheduler from a full configuration.
    pub fn new(config: &SchedulingConfig) -> Self {
        let resolver = &config.resolver;
        Self {
            config: resolver.clone(),
            protocols: config.protocol_table(),
            capacities: config.capacity_table(),
            dating: resolver.ga_calculator(),
            target: TargetDateCalculator::from_config(resolver),
            resolver: CapacityResolver::from_config(resolver),
        }
    }

    /// Replaces the protocol table.
    pub fn with_protocols(mut self, protocols: ProtocolTable) -> Self {
        self.protocols = protocols;
        self
    }

    /// Replaces the capacity table.
    pub fn with_capacities(mut self, capacities: CapacityTable) -> Self {
        self.capacities = capacities;
        self
    }

    /// The capacity table in use.
    pub fn capacities(&self) -> &CapacityTable {
        &self.capacities
    }

    /// Plans a booking against an occupancy lookup without storing it.
    pub fn plan<O>(
        &self,
        request: &BookingRequest,
        occupancy: &O,
    ) -> Result<BookingPlan, ScheduleError>
    where
        O: OccupancyLookup + ?Sized,
    {
        let (dating, protocol, target, capacity) = self.prepare(request)?;
        let slot = self
            .resolver
            .resolve(&request.facility, target.date, capacity, occupancy);
        Ok(self.assemble(request, dating, protocol, target, slot))
    }

    /// Plans a booking and stores it in `ledger`, resolving and inserting
    /// under one lock.
    pub fn book(
        &self,
        request: &BookingRequest,
        ledger: &BookingLedger,
    ) -> Result<BookingPlan, ScheduleError> {
        let (dating, protocol, target, capacity) = self.prepare(request)?;

        let mut planned = None;
        let slot = ledger.reserve(
            &request.facility,
            target.date,
            capacity,
            self.resolver.window(),
            |date, days_shifted| {
                let plan = self.assemble(
                    request,
                    dating.clone(),
                    protocol.clone(),
                    target,
                    SlotResult::Resolved { date, days_shifted },
                );
                let booking = plan.booking_on(date);
                planned = Some(plan);
                booking
            },
        )?;

        Ok(match planned {
            Some(plan) => plan,
            None => self.assemble(request, dating, protocol, target, slot),
        })
    }

    fn prepare(
        &self,
        request: &BookingRequest,
    ) -> Result<(DatingAssessment, ProtocolMatch, TargetDate, &FacilityCapacity), ScheduleError> {
        let dating = self.dating.assess(&request.clinical, request.reference_date)?;
        let protocol = self.protocols.ideal_ga(&request.diagnosis_tokens);
        let target = self
            .target
            .calculate(&dating.ga, &protocol, request.reference_date);
        let capacity = self
            .capacities
            .get(&request.facility)
            .ok_or_else(|| ScheduleError::UnknownFacility(request.facility.clone()))?;
        Ok((dating, protocol, target, capacity))
    }

    fn assemble(
        &self,
        request: &BookingRequest,
        dating: DatingAssessment,
        protocol: ProtocolMatch,
        target: TargetDate,
        slot: SlotResult,
    ) -> BookingPlan {
        let mut alerts = Vec::new();

        if let Some(intended) = request.intended_ga_weeks {
            if intended != protocol.ideal_ga_weeks {
                alerts.push(ReviewAlert::IntendedGaMismatch {
                    intended_weeks: intended,
                    protocol_weeks: protocol.ideal_ga_weeks,
                });
            }
        }

        let ga_at_slot = slot.date().map(|date| dating.ga.at(date));
        let interval_days = slot.date().map(|date| days_between(target.raw_date, date));
        if let (Some(ga), Some(interval)) = (ga_at_slot, interval_days) {
            let ideal_days = protocol.ideal_ga_days();
            let tolerance = i64::from(self.config.ga_deviation_tolerance_days);
            if (ga.total_days - ideal_days).abs() > tolerance {
                alerts.push(ReviewAlert::GaDeviation {
                    ga_at_slot_days: ga.total_days,
                    ideal_days,
                });
            }
            if IntervalGrade::classify(interval, protocol.margin_days) != IntervalGrade::Within {
                alerts.push(ReviewAlert::OutsideMargin {
                    interval_days: interval,
                    margin_days: protocol.margin_days,
                });
            }
        } else {
            alerts.push(ReviewAlert::NoSlotFound {
                target: target.date,
                window_days: self.resolver.window(),
            });
        }

        match slot {
            SlotResult::Resolved { date, days_shifted } => info!(
                "plan {}: {} by {}, protocol '{}' ({}w), target {}, booked {} ({:+} days)",
                request.id,
                dating.ga,
                dating.ga.method,
                protocol.token,
                protocol.ideal_ga_weeks,
                target.date,
                date,
                days_shifted
            ),
            SlotResult::NeedsManualReview => warn!(
                "plan {}: no slot at {} within ±{} days of {}",
                request.id,
                request.facility,
                self.resolver.window(),
                target.date
            ),
        }

        BookingPlan {
            id: request.id.clone(),
            facility: request.facility.clone(),
            registered_at: request.registered_at,
            due_date: dating.ga.due_date(),
            dating,
            protocol,
            target,
            slot,
            ga_at_slot,
            interval_days,
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GaError;
    use crate::models::{shift_days, GaMethod};
    use crate::protocol::ProtocolEntry;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn reference() -> NaiveDate {
        d(2025, 3, 3)
    }

    /// 30w0d by LMP on the reference date.
    fn request(facility: &str) -> BookingRequest {
        BookingRequest::new(
            "R1",
            facility,
            ClinicalDates::new().with_lmp(shift_days(reference(), -210), true),
            reference(),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
        )
    }

    fn empty(_: &str, _: NaiveDate) -> u32 {
        0
    }

    #[test]
    fn test_plan_full_chain() {
        let plan = BookingScheduler::default()
            .plan(
                &request("Salvalus").with_tokens(["pre-eclampsia", "macrossomia"]),
                &empty,
            )
            .unwrap();

        assert_eq!(plan.ga().total_days, 210);
        assert_eq!(plan.ga().method, GaMethod::Lmp);
        assert_eq!(plan.protocol.ideal_ga_weeks, 37);
        assert_eq!(plan.target.date, d(2025, 4, 21));
        assert_eq!(plan.scheduled_date(), Some(d(2025, 4, 21)));
        assert_eq!(plan.ga_at_slot.map(|g| g.total_days), Some(259));
        assert_eq!(plan.due_date, d(2025, 5, 12));
        assert_eq!(plan.interval_days, Some(0));
        assert_eq!(plan.interval_grade(), Some(IntervalGrade::Within));
        assert!(plan.alerts.is_empty());
    }

    #[test]
    fn test_default_protocol_without_tokens() {
        let plan = BookingScheduler::default()
            .plan(&request("Salvalus"), &empty)
            .unwrap();
        assert!(plan.protocol.is_default());
        assert_eq!(plan.target.date, d(2025, 5, 5));
    }

    #[test]
    fn test_ga_error_propagates() {
        let mut req = request("Salvalus");
        req.clinical = ClinicalDates::new();
        let err = BookingScheduler::default().plan(&req, &empty).unwrap_err();
        assert_eq!(err, ScheduleError::Ga(GaError::NoUsableSource));
    }

    #[test]
    fn test_unknown_facility() {
        let err = BookingScheduler::default()
            .plan(&request("Atlantis"), &empty)
            .unwrap_err();
        assert_eq!(err, ScheduleError::UnknownFacility("Atlantis".into()));
    }

    #[test]
    fn test_intended_ga_mismatch_alert() {
        let plan = BookingScheduler::default()
            .plan(
                &request("salvalus").with_token("hellp").with_intended_ga(37),
                &empty,
            )
            .unwrap();
        assert!(plan.alerts.contains(&ReviewAlert::IntendedGaMismatch {
            intended_weeks: 37,
            protocol_weeks: 34,
        }));
    }

    #[test]
    fn test_lead_time_raises_deviation_alert() {
        // HELLP (34w) at 35w0d: ideal already passed, lead time lands on 36w3d.
        let mut req = request("Salvalus").with_token("hellp");
        req.clinical = ClinicalDates::new().with_lmp(shift_days(reference(), -245), true);
        let plan = BookingScheduler::default().plan(&req, &empty).unwrap();

        assert!(plan.target.adjusted_for_lead_time);
        assert_eq!(plan.ga_at_slot.map(|g| g.total_days), Some(255));
        assert_eq!(plan.interval_days, Some(17));
        assert_eq!(plan.interval_grade(), Some(IntervalGrade::Outside));
        assert!(matches!(
            plan.alerts.as_slice(),
            [
                ReviewAlert::GaDeviation {
                    ideal_days: 238,
                    ..
                },
                ReviewAlert::OutsideMargin {
                    interval_days: 17,
                    margin_days: 7
                }
            ]
        ));
        let booking = plan.into_booking().unwrap();
        assert!(booking.needs_review);
        assert_eq!(booking.notes.len(), 2);
    }

    #[test]
    fn test_shift_beyond_protocol_margin_alerts() {
        // Mon 21st and Tue 22nd full at Guarulhos: booked Wed 23rd, 2 days past ideal.
        let full_until = |_: &str, day: NaiveDate| if day <= d(2025, 4, 22) { 2 } else { 0 };
        let scheduler = BookingScheduler::default()
            .with_protocols(ProtocolTable::new(vec![ProtocolEntry::new("tight", 37, 1)]));
        let plan = scheduler
            .plan(&request("Guarulhos").with_token("tight"), &full_until)
            .unwrap();

        assert_eq!(plan.scheduled_date(), Some(d(2025, 4, 23)));
        assert_eq!(plan.interval_grade(), Some(IntervalGrade::Near));
        assert_eq!(
            plan.alerts,
            vec![ReviewAlert::OutsideMargin {
                interval_days: 2,
                margin_days: 1
            }]
        );
        assert!(plan.needs_review());
    }

    #[test]
    fn test_interval_grade() {
        assert_eq!(IntervalGrade::classify(0, 7), IntervalGrade::Within);
        assert_eq!(IntervalGrade::classify(-7, 7), IntervalGrade::Within);
        assert_eq!(IntervalGrade::classify(8, 7), IntervalGrade::Near);
        assert_eq!(IntervalGrade::classify(-14, 7), IntervalGrade::Near);
        assert_eq!(IntervalGrade::classify(15, 7), IntervalGrade::Outside);
        assert_eq!(IntervalGrade::classify(1, 0), IntervalGrade::Outside);
    }

    #[test]
    fn test_implausible_dating_is_an_error() {
        let mut req = request("Salvalus");
        req.clinical = ClinicalDates::new().with_ultrasound(d(2025, 3, 1), 20_000_000, 0);
        let err = BookingScheduler::default().plan(&req, &empty).unwrap_err();
        assert!(matches!(err, ScheduleError::Ga(GaError::InvalidDates(_))));
    }

    #[test]
    fn test_no_slot_alert_and_no_booking() {
        let full = |_: &str, _: NaiveDate| 100u32;
        let plan = BookingScheduler::default()
            .plan(&request("Guarulhos"), &full)
            .unwrap();
        assert_eq!(plan.slot, SlotResult::NeedsManualReview);
        assert!(plan.ga_at_slot.is_none());
        assert!(matches!(
            plan.alerts[..],
            [ReviewAlert::NoSlotFound { window_days: 7, .. }]
        ));
        assert!(plan.interval_grade().is_none());
        assert!(plan.into_booking().is_none());
    }

    #[test]
    fn test_book_inserts_into_ledger() {
        let scheduler = BookingScheduler::default();
        let ledger = BookingLedger::new();
        let first = scheduler
            .book(&request("Guarulhos").with_token("rcf"), &ledger)
            .unwrap();
        let mut second_req = request("Guarulhos").with_token("rcf");
        second_req.id = BookingId::new("R2");
        let second = scheduler.book(&second_req, &ledger).unwrap();
        let mut third_req = second_req.clone();
        third_req.id = BookingId::new("R3");
        let third = scheduler.book(&third_req, &ledger).unwrap();

        // Guarulhos weekday capacity 2: the third moves to the next day.
        assert_eq!(first.scheduled_date(), second.scheduled_date());
        assert_eq!(
            third.slot,
            SlotResult::Resolved {
                date: d(2025, 4, 22),
                days_shifted: 1
            }
        );
        assert_eq!(ledger.len(), 3);
        assert_eq!(
            ledger.get(&"R3".into()).map(|b| b.target_date),
            Some(d(2025, 4, 22))
        );
    }

    #[test]
    fn test_book_conflicting_id() {
        let scheduler = BookingScheduler::default();
        let ledger = BookingLedger::new();
        scheduler.book(&request("Salvalus"), &ledger).unwrap();
        let err = scheduler.book(&request("Salvalus"), &ledger).unwrap_err();
        assert!(matches!(err, ScheduleError::Persist(_)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_alert_display() {
        let alert = ReviewAlert::GaDeviation {
            ga_at_slot_days: 255,
            ideal_days: 238,
        };
        assert_eq!(
            alert.to_string(),
            "GA on scheduled date is 36w3d, ideal 34w (+17 days)"
        );
    }
}
