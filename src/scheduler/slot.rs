//! Capacity-bounded slot search.
//!
//! # Algorithm
//!
//! Try the ideal date, then `+1..=+W` days, then `-1..=-W` days. The
//! first date whose occupancy is below its day-type capacity wins. Dates
//! with zero capacity are skipped without querying occupancy.
//!
//! # Complexity
//! At most `2W + 1` candidate dates.

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::models::{shift_days, FacilityCapacity};

/// Answers how many active bookings a facility holds on a date.
///
/// Implementations count non-rejected bookings and match facility names
/// case-insensitively.
pub trait OccupancyLookup {
    /// Active bookings at `facility` on `date`.
    fn occupancy(&self, facility: &str, date: NaiveDate) -> u32;
}

impl<F> OccupancyLookup for F
where
    F: Fn(&str, NaiveDate) -> u32,
{
    fn occupancy(&self, facility: &str, date: NaiveDate) -> u32 {
        self(facility, date)
    }
}

/// Outcome of a slot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotResult {
    /// A date with free capacity.
    Resolved {
        /// The chosen date.
        date: NaiveDate,
        /// Signed offset from the ideal date.
        days_shifted: i32,
    },
    /// No free date within the window.
    NeedsManualReview,
}

impl SlotResult {
    /// The resolved date, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            SlotResult::Resolved { date, .. } => Some(*date),
            SlotResult::NeedsManualReview => None,
        }
    }

    /// Whether a date was found.
    pub fn is_resolved(&self) -> bool {
        matches!(self, SlotResult::Resolved { .. })
    }
}

/// Day offsets in search order: 0, +1..=+W, -1..=-W.
fn search_offsets(window: u32) -> impl Iterator<Item = i32> {
    let w = i32::try_from(window).unwrap_or(i32::MAX);
    std::iter::once(0).chain(1..=w).chain((1..=w).map(|k| -k))
}

/// Finds the nearest date with free capacity for `facility`.
pub fn resolve_slot<O>(
    facility: &str,
    ideal_date: NaiveDate,
    capacity: &FacilityCapacity,
    occupancy: &O,
    search_window_days: u32,
) -> SlotResult
where
    O: OccupancyLookup + ?Sized,
{
    for offset in search_offsets(search_window_days) {
        let day = shift_days(ideal_date, i64::from(offset));
        let cap = capacity.capacity_on(day);
        if cap == 0 {
            debug!("{facility} {day}: closed");
            continue;
        }
        let used = occupancy.occupancy(facility, day);
        if used < cap {
            debug!("{facility} {day}: {used}/{cap}, taking slot ({offset:+} days)");
            return SlotResult::Resolved {
                date: day,
                days_shifted: offset,
            };
        }
        debug!("{facility} {day}: full ({used}/{cap})");
    }
    SlotResult::NeedsManualReview
}

/// Slot search with a configured window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityResolver {
    search_window_days: u32,
}

impl Default for CapacityResolver {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl CapacityResolver {
    /// Creates a resolver with the default ±7 day window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver from resolver configuration.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            search_window_days: config.search_window_days,
        }
    }

    /// Sets the search radius.
    pub fn with_window(mut self, days: u32) -> Self {
        self.search_window_days = days;
        self
    }

    /// The search radius in days.
    pub fn window(&self) -> u32 {
        self.search_window_days
    }

    /// See [`resolve_slot`].
    pub fn resolve<O>(
        &self,
        facility: &str,
        ideal_date: NaiveDate,
        capacity: &FacilityCapacity,
        occupancy: &O,
    ) -> SlotResult
    where
        O: OccupancyLookup + ?Sized,
    {
        resolve_slot(
            facility,
            ideal_date,
            capacity,
            occupancy,
            self.search_window_days,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn salvalus() -> FacilityCapacity {
        FacilityCapacity::new("Salvalus")
            .with_weekday(9)
            .with_saturday(7)
    }

    #[test]
    fn test_search_order() {
        let order: Vec<i32> = search_offsets(3).collect();
        assert_eq!(order, vec![0, 1, 2, 3, -1, -2, -3]);
        assert_eq!(search_offsets(0).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_ideal_date_free() {
        let occ = |_: &str, _: NaiveDate| 0;
        let r = resolve_slot("Salvalus", d(2025, 3, 4), &salvalus(), &occ, 7);
        assert_eq!(
            r,
            SlotResult::Resolved {
                date: d(2025, 3, 4),
                days_shifted: 0
            }
        );
    }

    #[test]
    fn test_forward_before_backward() {
        // Tue full; Wed has room; Mon has room.
        let full: HashMap<NaiveDate, u32> = [(d(2025, 3, 4), 9)].into();
        let occ = |_: &str, day: NaiveDate| full.get(&day).copied().unwrap_or(0);
        let r = resolve_slot("Salvalus", d(2025, 3, 4), &salvalus(), &occ, 7);
        assert_eq!(r.date(), Some(d(2025, 3, 5)));
    }

    #[test]
    fn test_backward_when_forward_full() {
        // Everything from Tue 4th to Tue 11th is full (Sunday closed); Mon 3rd free.
        let occ = |_: &str, day: NaiveDate| if day >= d(2025, 3, 4) { 9 } else { 0 };
        let r = resolve_slot("Salvalus", d(2025, 3, 4), &salvalus(), &occ, 7);
        assert_eq!(
            r,
            SlotResult::Resolved {
                date: d(2025, 3, 3),
                days_shifted: -1
            }
        );
    }

    #[test]
    fn test_zero_capacity_not_queried() {
        let queried = RefCell::new(Vec::new());
        let occ = |_: &str, day: NaiveDate| {
            queried.borrow_mut().push(day);
            99
        };
        let closed = FacilityCapacity::new("X");
        let r = resolve_slot("X", d(2025, 3, 9), &closed, &occ, 7);
        assert_eq!(r, SlotResult::NeedsManualReview);
        assert!(queried.borrow().is_empty());
    }

    #[test]
    fn test_candidate_count_bounded() {
        let calls = RefCell::new(0u32);
        let occ = |_: &str, _: NaiveDate| {
            *calls.borrow_mut() += 1;
            100
        };
        let always_open = salvalus().with_sunday(1);
        let r = resolve_slot("Salvalus", d(2025, 3, 4), &always_open, &occ, 5);
        assert!(!r.is_resolved());
        assert_eq!(*calls.borrow(), 11);
    }

    #[test]
    fn test_resolver_uses_window() {
        let occ = |_: &str, day: NaiveDate| if day == d(2025, 3, 4) { 9 } else { 0 };
        let resolver = CapacityResolver::new().with_window(0);
        assert_eq!(resolver.window(), 0);
        assert_eq!(
            resolver.resolve("Salvalus", d(2025, 3, 4), &salvalus(), &occ),
            SlotResult::NeedsManualReview
        );
    }
}
