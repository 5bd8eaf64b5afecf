//! In-memory booking ledger.
//!
//! A cloneable handle over shared booking state. Implements
//! [`OccupancyLookup`] and [`Relocator`], so it can back both the booking
//! pipeline and the overbooking auditor without a database.
//!
//! [`BookingLedger::reserve`] holds the write lock across occupancy read,
//! slot decision and insertion: two concurrent reservations can never
//! both take the last free slot of a day.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use log::debug;

use crate::audit::Relocator;
use crate::error::PersistError;
use crate::models::{facility_key, Booking, BookingId, FacilityCapacity, NoteEntry};
use crate::scheduler::{resolve_slot, OccupancyLookup, SlotResult};

#[derive(Debug, Default)]
struct LedgerData {
    bookings: Vec<Booking>,
    index: HashMap<BookingId, usize>,
}

impl LedgerData {
    fn insert(&mut self, booking: Booking) -> Result<(), PersistError> {
        if self.index.contains_key(&booking.id) {
            return Err(PersistError::Conflict {
                id: booking.id,
                reason: "id already exists".to_string(),
            });
        }
        self.index.insert(booking.id.clone(), self.bookings.len());
        self.bookings.push(booking);
        Ok(())
    }

    fn get_mut(&mut self, id: &BookingId) -> Result<&mut Booking, PersistError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.bookings[i]),
            None => Err(PersistError::NotFound(id.clone())),
        }
    }
}

impl OccupancyLookup for LedgerData {
    fn occupancy(&self, facility: &str, date: NaiveDate) -> u32 {
        let key = facility_key(facility);
        let count = self
            .bookings
            .iter()
            .filter(|b| b.is_active() && b.target_date == date && facility_key(&b.facility) == key)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Shared in-memory booking store.
#[derive(Debug, Clone, Default)]
pub struct BookingLedger {
    data: Arc<RwLock<LedgerData>>,
}

impl BookingLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger holding `bookings`.
    ///
    /// Fails with [`PersistError::Conflict`] on a duplicate id.
    pub fn from_bookings(
        bookings: impl IntoIterator<Item = Booking>,
    ) -> Result<Self, PersistError> {
        let ledger = Self::new();
        {
            let mut data = ledger.write();
            for booking in bookings {
                data.insert(booking)?;
            }
        }
        Ok(ledger)
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a booking as given.
    pub fn insert(&self, booking: Booking) -> Result<(), PersistError> {
        self.write().insert(booking)
    }

    /// A copy of one booking.
    pub fn get(&self, id: &BookingId) -> Option<Booking> {
        let data = self.read();
        data.index.get(id).map(|&i| data.bookings[i].clone())
    }

    /// A copy of every booking, in insertion order.
    pub fn snapshot(&self) -> Vec<Booking> {
        self.read().bookings.clone()
    }

    /// Number of bookings (any status).
    pub fn len(&self) -> usize {
        self.read().bookings.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.read().bookings.is_empty()
    }

    /// Finds a slot and stores the booking built for it, atomically.
    ///
    /// `build` receives the chosen date and its offset from `ideal_date`.
    /// Nothing is stored when the search is exhausted.
    pub fn reserve<F>(
        &self,
        facility: &str,
        ideal_date: NaiveDate,
        capacity: &FacilityCapacity,
        search_window_days: u32,
        build: F,
    ) -> Result<SlotResult, PersistError>
    where
        F: FnOnce(NaiveDate, i32) -> Booking,
    {
        let mut data = self.write();
        let slot = resolve_slot(facility, ideal_date, capacity, &*data, search_window_days);
        if let SlotResult::Resolved { date, days_shifted } = slot {
            let booking = build(date, days_shifted);
            debug!("ledger: reserving {} at {} on {}", booking.id, facility, date);
            data.insert(booking)?;
        }
        Ok(slot)
    }
}

impl OccupancyLookup for BookingLedger {
    fn occupancy(&self, facility: &str, date: NaiveDate) -> u32 {
        self.read().occupancy(facility, date)
    }
}

impl Relocator for BookingLedger {
    fn relocate(
        &self,
        id: &BookingId,
        new_date: NaiveDate,
        note: &NoteEntry,
    ) -> Result<(), PersistError> {
        let mut data = self.write();
        data.get_mut(id)?.apply_relocation(new_date, note.clone());
        Ok(())
    }

    fn flag_for_review(&self, id: &BookingId, note: &NoteEntry) -> Result<(), PersistError> {
        let mut data = self.write();
        data.get_mut(id)?.flag_for_review(note.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, GaMethod, GestationalAge};
    use chrono::{TimeZone, Utc};
    use std::thread;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn booking(id: &str, facility: &str, date: NaiveDate) -> Booking {
        let registered = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Booking::new(
            id,
            facility,
            date,
            registered,
            GestationalAge::new(250, GaMethod::Lmp, d(1)),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let ledger = BookingLedger::new();
        assert!(ledger.is_empty());
        ledger.insert(booking("A", "Salvalus", d(4))).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&"A".into()).map(|b| b.target_date), Some(d(4)));
        assert!(ledger.get(&"missing".into()).is_none());
    }

    #[test]
    fn test_duplicate_id_conflict() {
        let ledger = BookingLedger::from_bookings(vec![booking("A", "Salvalus", d(4))]).unwrap();
        let err = ledger.insert(booking("A", "Salvalus", d(5))).unwrap_err();
        assert!(matches!(err, PersistError::Conflict { .. }));
        assert!(BookingLedger::from_bookings(vec![
            booking("A", "X", d(4)),
            booking("A", "X", d(4)),
        ])
        .is_err());
    }

    #[test]
    fn test_occupancy_counts_active_case_insensitive() {
        let ledger = BookingLedger::from_bookings(vec![
            booking("A", "Salvalus", d(4)),
            booking("B", "SALVALUS", d(4)),
            booking("C", "Salvalus", d(4)).with_status(BookingStatus::Rejected),
            booking("D", "Salvalus", d(5)),
            booking("E", "Cruzeiro", d(4)),
        ])
        .unwrap();
        assert_eq!(ledger.occupancy("salvalus", d(4)), 2);
        assert_eq!(ledger.occupancy("Salvalus", d(5)), 1);
        assert_eq!(ledger.occupancy("Guarulhos", d(4)), 0);
    }

    #[test]
    fn test_relocate_and_flag() {
        let ledger = BookingLedger::from_bookings(vec![booking("A", "Salvalus", d(4))]).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();

        ledger
            .relocate(&"A".into(), d(5), &NoteEntry::relocated(at, d(4), d(5), 1))
            .unwrap();
        ledger
            .flag_for_review(&"A".into(), &NoteEntry::remark(at, "check"))
            .unwrap();

        let a = ledger.get(&"A".into()).unwrap();
        assert_eq!(a.target_date, d(5));
        assert!(a.needs_review);
        assert_eq!(a.notes.len(), 2);

        let err = ledger
            .relocate(&"Z".into(), d(5), &NoteEntry::remark(at, "x"))
            .unwrap_err();
        assert_eq!(err, PersistError::NotFound("Z".into()));
    }

    #[test]
    fn test_reserve_exhausted_stores_nothing() {
        let ledger = BookingLedger::new();
        let closed = FacilityCapacity::new("X");
        let slot = ledger
            .reserve("X", d(4), &closed, 7, |date, _| booking("A", "X", date))
            .unwrap();
        assert_eq!(slot, SlotResult::NeedsManualReview);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_concurrent_reservations_respect_capacity() {
        let ledger = BookingLedger::new();
        let capacity = FacilityCapacity::new("Cruzeiro").with_weekday(3);

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let ledger = ledger.clone();
                let capacity = capacity.clone();
                thread::spawn(move || {
                    ledger
                        .reserve("Cruzeiro", d(4), &capacity, 0, |date, _| {
                            booking(&format!("B{i}"), "Cruzeiro", date)
                        })
                        .unwrap()
                })
            })
            .collect();
        let resolved = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(SlotResult::is_resolved)
            .count();

        assert_eq!(resolved, 3);
        assert_eq!(ledger.occupancy("Cruzeiro", d(4)), 3);
    }
}
