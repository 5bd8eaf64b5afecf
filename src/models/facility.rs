//! Facility capacity model.
//!
//! A facility (maternity unit) accepts a bounded number of bookings per
//! calendar day, depending on the day type. Rows are maintained by an
//! external administrative process; this crate only reads snapshots.
//!
//! Facility names arrive from upstream sources with inconsistent casing,
//! so every lookup here is case-insensitive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DayType;

/// Daily booking capacity of one facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityCapacity {
    /// Facility name (display form).
    pub facility: String,
    /// Bookings accepted on Monday..Friday.
    pub weekday_capacity: u32,
    /// Bookings accepted on Saturday.
    #[serde(default)]
    pub saturday_capacity: u32,
    /// Bookings accepted on Sunday (usually 0).
    #[serde(default)]
    pub sunday_capacity: u32,
}

impl FacilityCapacity {
    /// Creates a facility row with zero capacity everywhere.
    pub fn new(facility: impl Into<String>) -> Self {
        Self {
            facility: facility.into(),
            weekday_capacity: 0,
            saturday_capacity: 0,
            sunday_capacity: 0,
        }
    }

    /// Sets the Monday..Friday capacity.
    pub fn with_weekday(mut self, capacity: u32) -> Self {
        self.weekday_capacity = capacity;
        self
    }

    /// Sets the Saturday capacity.
    pub fn with_saturday(mut self, capacity: u32) -> Self {
        self.saturday_capacity = capacity;
        self
    }

    /// Sets the Sunday capacity.
    pub fn with_sunday(mut self, capacity: u32) -> Self {
        self.sunday_capacity = capacity;
        self
    }

    /// Capacity for a day type.
    pub fn capacity_for(&self, day_type: DayType) -> u32 {
        match day_type {
            DayType::Weekday => self.weekday_capacity,
            DayType::Saturday => self.saturday_capacity,
            DayType::Sunday => self.sunday_capacity,
        }
    }

    /// Capacity for a calendar date.
    #[inline]
    pub fn capacity_on(&self, date: NaiveDate) -> u32 {
        self.capacity_for(DayType::of(date))
    }

    /// Whether `name` refers to this facility (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        facility_key(&self.facility) == facility_key(name)
    }
}

/// Canonical lookup key for a facility name: trimmed and lowercased.
pub fn facility_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Snapshot of every facility's capacity row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityTable {
    rows: Vec<FacilityCapacity>,
}

impl CapacityTable {
    /// Creates a table from rows.
    ///
    /// Duplicate facility names are not rejected here; see
    /// [`validate_capacity_table`](crate::validation::validate_capacity_table).
    /// The first row for a name wins on lookup.
    pub fn new(rows: Vec<FacilityCapacity>) -> Self {
        Self { rows }
    }

    /// The built-in facility rows.
    pub fn builtin() -> Self {
        Self::new(vec![
            FacilityCapacity::new("Salvalus")
                .with_weekday(9)
                .with_saturday(7),
            FacilityCapacity::new("NotreCare")
                .with_weekday(6)
                .with_saturday(2),
            FacilityCapacity::new("Cruzeiro")
                .with_weekday(3)
                .with_saturday(1),
            FacilityCapacity::new("Guarulhos")
                .with_weekday(2)
                .with_saturday(1),
        ])
    }

    /// Adds a row.
    pub fn with_row(mut self, row: FacilityCapacity) -> Self {
        self.rows.push(row);
        self
    }

    /// Finds a facility's row (case-insensitive).
    pub fn get(&self, facility: &str) -> Option<&FacilityCapacity> {
        let key = facility_key(facility);
        self.rows.iter().find(|r| facility_key(&r.facility) == key)
    }

    /// All rows, in insertion order.
    pub fn rows(&self) -> &[FacilityCapacity] {
        &self.rows
    }

    /// Number of facilities.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<FacilityCapacity>> for CapacityTable {
    fn from(rows: Vec<FacilityCapacity>) -> Self {
        Self::new(rows)
    }
}
