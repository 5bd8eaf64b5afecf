//! Scheduling domain models.
//!
//! Provides the data types shared by every resolver stage: clinical dating
//! inputs, the arbitrated gestational age, facility capacity rows, bookings
//! with their append-only note history, and calendar helpers.
//!
//! # Domain Mappings
//!
//! | u-gestation | Portal concept | Source |
//! |-------------|----------------|--------|
//! | ClinicalDates | Intake dating fields | Intake form / import |
//! | GestationalAge | Current GA | Derived |
//! | FacilityCapacity | Maternity daily slots | Admin settings |
//! | Booking | Scheduled delivery/procedure | Booking store |

mod booking;
mod calendar;
mod clinical;
mod facility;

pub use booking::{Booking, BookingId, BookingStatus, NoteEntry, NoteKind, NoteLog};
pub use calendar::{days_between, shift_days, skip_weekday, DateWindow, DayType};
pub use clinical::{ClinicalDates, GaMethod, GestationalAge, FULL_TERM_DAYS, MAX_GA_DAYS};
pub use facility::{facility_key, CapacityTable, FacilityCapacity};
