//! Overbooking detection and correction.
//!
//! Bookings can exceed a facility's day capacity when they bypass the
//! resolver (imports, manual edits, capacity reductions). An audit pass
//! finds every overbooked (facility, date) pair and moves the surplus to
//! the nearest free date.
//!
//! # Algorithm
//!
//! 1. **Detect**: group active bookings by (facility, date), facility
//!    compared case-insensitively; a group larger than its day-type
//!    capacity is a case.
//! 2. **Partition**: order the group by registration time (ties by id).
//!    The first `capacity` bookings keep their date; the rest are surplus.
//! 3. **Relocate**: run the slot search from each surplus booking's date.
//!    A found date is persisted through the [`Relocator`] and only then
//!    applied in memory, with a note. No date means the booking stays,
//!    gets the review hint and a note. A booking that already carries a
//!    no-slot note for the same date is reported without a second note.
//!
//! [`OverbookingAuditor::simulate`] runs the same pass on a copy, with
//! proposed moves counted against occupancy but nothing written.
//!
//! A store failure is recorded and the pass continues with the next
//! booking. Running the pass again without intervening changes relocates
//! nothing and writes no notes.
//!
//! The occupancy lookup must reflect relocations committed through the
//! relocator during the same pass; [`BookingLedger`](crate::store::BookingLedger)
//! serves as both.

mod report;

pub use report::{
    AuditReport, AuditSummary, ManualReview, OverbookingCase, PersistFailure, Relocation,
};

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::PersistError;
use crate::models::{facility_key, Booking, BookingId, CapacityTable, NoteEntry, NoteKind};
use crate::scheduler::{CapacityResolver, OccupancyLookup, SlotResult};

/// Persists booking changes made by the auditor.
pub trait Relocator {
    /// Moves a booking to `new_date` and stores `note` with it.
    fn relocate(
        &self,
        id: &BookingId,
        new_date: NaiveDate,
        note: &NoteEntry,
    ) -> Result<(), PersistError>;

    /// Stores the review hint and `note` for a booking left in place.
    fn flag_for_review(&self, _id: &BookingId, _note: &NoteEntry) -> Result<(), PersistError> {
        Ok(())
    }
}

impl<F> Relocator for F
where
    F: Fn(&BookingId, NaiveDate, &NoteEntry) -> Result<(), PersistError>,
{
    fn relocate(
        &self,
        id: &BookingId,
        new_date: NaiveDate,
        note: &NoteEntry,
    ) -> Result<(), PersistError> {
        self(id, new_date, note)
    }
}

/// Surplus bookings of one case, by index into the audited slice.
struct Detected {
    case: OverbookingCase,
    surplus: Vec<usize>,
}

/// Occupancy overlay for a dry run: the caller's lookup plus the moves
/// proposed so far in the pass.
struct Simulation<'a, O: ?Sized> {
    base: &'a O,
    facilities: HashMap<BookingId, String>,
    delta: RefCell<HashMap<(String, NaiveDate), i64>>,
}

impl<O> OccupancyLookup for Simulation<'_, O>
where
    O: OccupancyLookup + ?Sized,
{
    fn occupancy(&self, facility: &str, date: NaiveDate) -> u32 {
        let base = i64::from(self.base.occupancy(facility, date));
        let delta = self
            .delta
            .borrow()
            .get(&(facility_key(facility), date))
            .copied()
            .unwrap_or(0);
        u32::try_from((base + delta).max(0)).unwrap_or(u32::MAX)
    }
}

impl<O: ?Sized> Relocator for Simulation<'_, O> {
    fn relocate(
        &self,
        id: &BookingId,
        new_date: NaiveDate,
        note: &NoteEntry,
    ) -> Result<(), PersistError> {
        let key = self
            .facilities
            .get(id)
            .ok_or_else(|| PersistError::NotFound(id.clone()))?;
        let mut delta = self.delta.borrow_mut();
        if let NoteKind::Relocated { original_date, .. } = note.kind {
            *delta.entry((key.clone(), original_date)).or_default() -= 1;
        }
        *delta.entry((key.clone(), new_date)).or_default() += 1;
        Ok(())
    }
}

/// Batch overbooking auditor.
#[derive(Debug, Clone, Default)]
pub struct OverbookingAuditor {
    resolver: CapacityResolver,
    clock: Option<DateTime<Utc>>,
}

impl OverbookingAuditor {
    /// Creates an auditor using the configured search window.
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            resolver: CapacityResolver::from_config(config),
            clock: None,
        }
    }

    /// Fixes the timestamp written into notes (defaults to now).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.clock = Some(timestamp);
        self
    }

    /// Sets the search radius.
    pub fn with_window(mut self, days: u32) -> Self {
        self.resolver = self.resolver.with_window(days);
        self
    }

    /// Overbooked pairs in `bookings`, ordered by facility then date.
    pub fn detect(
        &self,
        bookings: &[Booking],
        capacities: &CapacityTable,
    ) -> Vec<OverbookingCase> {
        detect_cases(bookings, capacities)
            .0
            .into_iter()
            .map(|d| d.case)
            .collect()
    }

    /// The report a correcting pass would produce, without touching
    /// `bookings` or any store.
    ///
    /// `occupancy` describes the store as it is; moves proposed earlier in
    /// the pass are added on top of it.
    pub fn simulate<O>(
        &self,
        bookings: &[Booking],
        capacities: &CapacityTable,
        occupancy: &O,
    ) -> AuditReport
    where
        O: OccupancyLookup + ?Sized,
    {
        info!("audit: dry run over {} bookings", bookings.len());
        let simulation = Simulation {
            base: occupancy,
            facilities: bookings
                .iter()
                .map(|b| (b.id.clone(), facility_key(&b.facility)))
                .collect(),
            delta: RefCell::new(HashMap::new()),
        };
        let mut scratch = bookings.to_vec();
        let mut report = self.audit_and_correct(&mut scratch, capacities, &simulation, &simulation);
        report.simulated = true;
        report
    }

    /// Detects overbooking and relocates the surplus.
    ///
    /// `bookings` is updated in place for every change the relocator
    /// accepted.
    pub fn audit_and_correct<O, R>(
        &self,
        bookings: &mut [Booking],
        capacities: &CapacityTable,
        occupancy: &O,
        relocator: &R,
    ) -> AuditReport
    where
        O: OccupancyLookup + ?Sized,
        R: Relocator + ?Sized,
    {
        let now = self.clock.unwrap_or_else(Utc::now);
        let mut report = AuditReport::new(now);

        let (detected, unconfigured) = detect_cases(bookings, capacities);
        for facility in &unconfigured {
            warn!("audit: facility '{facility}' has bookings but no capacity row, skipped");
        }
        report.unconfigured_facilities = unconfigured;

        info!(
            "audit: {} active bookings, {} overbooked dates",
            bookings.iter().filter(|b| b.is_active()).count(),
            detected.len()
        );

        for Detected { case, surplus } in detected {
            let Some(capacity) = capacities.get(&case.facility) else {
                continue;
            };
            debug!(
                "audit: {} {} holds {} bookings for capacity {}",
                case.facility,
                case.date,
                case.bookings.len(),
                case.capacity
            );

            for idx in surplus {
                let booking = &mut bookings[idx];
                let original_date = booking.target_date;
                let slot = self
                    .resolver
                    .resolve(&booking.facility, original_date, capacity, occupancy);

                match slot {
                    SlotResult::Resolved { days_shifted: 0, .. } => {
                        debug!(
                            "audit: {} fits on {} after earlier moves",
                            booking.id, original_date
                        );
                        report.kept_after_recount.push(booking.id.clone());
                    }
                    SlotResult::Resolved { date, days_shifted } => {
                        let note = NoteEntry::relocated(now, original_date, date, days_shifted);
                        match relocator.relocate(&booking.id, date, &note) {
                            Ok(()) => {
                                info!(
                                    "audit: {} moved {} -> {} ({:+} days)",
                                    booking.id, original_date, date, days_shifted
                                );
                                booking.apply_relocation(date, note);
                                report.relocated.push(Relocation {
                                    id: booking.id.clone(),
                                    facility: booking.facility.clone(),
                                    original_date,
                                    new_date: date,
                                    shift_days: days_shifted,
                                });
                            }
                            Err(error) => {
                                warn!("audit: failed to relocate {}: {}", booking.id, error);
                                report.failures.push(PersistFailure {
                                    id: booking.id.clone(),
                                    date: original_date,
                                    error,
                                });
                            }
                        }
                    }
                    SlotResult::NeedsManualReview if booking.has_no_slot_note(original_date) => {
                        debug!("audit: {} already flagged for review", booking.id);
                        report.manual_review.push(ManualReview {
                            id: booking.id.clone(),
                            facility: booking.facility.clone(),
                            date: original_date,
                            already_flagged: true,
                        });
                    }
                    SlotResult::NeedsManualReview => {
                        let window = self.resolver.window();
                        let note = NoteEntry::no_slot_found(now, original_date, window);
                        match relocator.flag_for_review(&booking.id, &note) {
                            Ok(()) => {
                                warn!(
                                    "audit: no slot within ±{window} days for {} on {}, \
                                     manual review required",
                                    booking.id, original_date
                                );
                                booking.flag_for_review(note);
                                report.manual_review.push(ManualReview {
                                    id: booking.id.clone(),
                                    facility: booking.facility.clone(),
                                    date: original_date,
                                    already_flagged: false,
                                });
                            }
                            Err(error) => {
                                warn!("audit: failed to flag {}: {}", booking.id, error);
                                report.failures.push(PersistFailure {
                                    id: booking.id.clone(),
                                    date: original_date,
                                    error,
                                });
                            }
                        }
                    }
                }
            }

            report.cases.push(case);
        }

        let summary = report.summary();
        info!(
            "audit done: {} cases, {} relocated, {} manual review, {} failures",
            summary.cases, summary.relocated, summary.manual_review, summary.failures
        );
        report
    }
}

/// Groups active bookings and returns overbooked groups plus the display
/// names of facilities without a capacity row.
fn detect_cases(
    bookings: &[Booking],
    capacities: &CapacityTable,
) -> (Vec<Detected>, Vec<String>) {
    let mut groups: BTreeMap<(String, NaiveDate), Vec<usize>> = BTreeMap::new();
    let mut unconfigured: BTreeMap<String, String> = BTreeMap::new();

    for (idx, booking) in bookings.iter().enumerate() {
        if !booking.is_active() {
            continue;
        }
        let key = facility_key(&booking.facility);
        if capacities.get(&key).is_none() {
            unconfigured
                .entry(key)
                .or_insert_with(|| booking.facility.clone());
            continue;
        }
        groups.entry((key, booking.target_date)).or_default().push(idx);
    }

    let mut detected = Vec::new();
    for ((key, date), mut members) in groups {
        let Some(row) = capacities.get(&key) else {
            continue;
        };
        let capacity = row.capacity_on(date);
        if members.len() <= capacity as usize {
            continue;
        }

        members.sort_by(|&a, &b| {
            let (a, b) = (&bookings[a], &bookings[b]);
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let facility = bookings[members[0]].facility.clone();
        let surplus = members.split_off(capacity as usize);

        let case = OverbookingCase {
            facility,
            date,
            capacity,
            bookings: members
                .iter()
                .chain(surplus.iter())
                .map(|&i| bookings[i].id.clone())
                .collect(),
            surplus: surplus.iter().map(|&i| bookings[i].id.clone()).collect(),
        };
        detected.push(Detected { case, surplus });
    }

    (detected, unconfigured.into_values().collect())
}
