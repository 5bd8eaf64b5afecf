//! Target dates, slot search and the booking pipeline.
//!
//! # Algorithm
//!
//! `BookingScheduler` chains GA arbitration, protocol lookup, target date
//! derivation and a bounded capacity search for one request. Each stage is
//! also usable alone.
//!
//! # Stages
//!
//! - `TargetDateCalculator`: GA + ideal GA → calendar date, skipping the
//!   no-booking weekday and honouring the minimum lead time.
//! - `CapacityResolver`: target date → nearest date with free day-type
//!   capacity within ±W days, forward first.

mod pipeline;
mod slot;
mod target;

pub use pipeline::{BookingPlan, BookingRequest, BookingScheduler, IntervalGrade, ReviewAlert};
pub use slot::{resolve_slot, CapacityResolver, OccupancyLookup, SlotResult};
pub use target::{target_date, TargetDate, TargetDateCalculator};
