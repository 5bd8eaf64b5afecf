//! Gestational scheduling resolver.
//!
//! Turns clinical dating inputs and diagnoses into a delivery or procedure
//! date that respects per-facility daily capacity, and repairs capacity
//! violations in an existing booking set.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `ClinicalDates`, `GestationalAge`,
//!   `FacilityCapacity`, `Booking`, `NoteLog`, calendar helpers
//! - **`gestation`**: LMP/ultrasound arbitration with a tolerance table
//! - **`protocol`**: Diagnosis tokens → ideal GA, most urgent wins
//! - **`scheduler`**: Target date, capacity-bounded slot search, booking pipeline
//! - **`audit`**: Batch overbooking detection and FIFO correction
//! - **`store`**: In-memory booking ledger implementing the store contracts
//! - **`config`**: TOML configuration with defaults
//! - **`validation`**: Structural checks (duplicate facilities/tokens, tolerance bands)
//!
//! # Architecture
//!
//! Persistence, UI and import are out of scope. The crate talks to a store
//! through two traits: `scheduler::OccupancyLookup` (count active bookings
//! for a facility and date) and `audit::Relocator` (persist a date change
//! with its note).
//!
//! # References
//!
//! - ACOG Committee Opinion 700 (2017), "Methods for Estimating the Due Date"
//! - PT-AON-097 Rev. 4 (2024), "Resolution of pregnancy by clinical indication"

pub mod audit;
pub mod config;
pub mod error;
pub mod gestation;
pub mod models;
pub mod protocol;
pub mod scheduler;
pub mod store;
pub mod validation;
