//! Structural validation of resolver inputs.
//!
//! Checks capacity tables, protocol tables, tolerance tables and clinical
//! dating records before they are used. Detects:
//! - Duplicate facility names (case-insensitive) and blank names
//! - Duplicate or empty protocol tokens, implausible ideal GA
//! - Tolerance bands that are inverted, overlapping, out of order or
//!   non-monotone
//! - Ultrasound GA days outside 0..=6, ultrasound GA beyond 45 weeks
//! - Resolver scalars (lead time, search window, tolerances) out of range
//!
//! Every check collects all problems instead of stopping at the first.

use std::collections::HashSet;

use crate::config::ResolverConfig;
use crate::gestation::ToleranceTable;
use crate::models::{facility_key, CapacityTable, ClinicalDates, MAX_GA_DAYS};
use crate::protocol::ProtocolEntry;

/// Longest accepted minimum lead time, in days.
pub const MAX_LEAD_TIME_DAYS: u32 = 180;

/// Widest accepted slot search radius, in days.
pub const MAX_SEARCH_WINDOW_DAYS: u32 = 60;

/// Largest accepted margin or GA deviation tolerance, in days.
pub const MAX_TOLERANCE_DAYS: u32 = 42;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two capacity rows name the same facility.
    DuplicateFacility,
    /// A capacity row has a blank facility name.
    EmptyFacility,
    /// Two protocol entries share a token.
    DuplicateToken,
    /// A protocol entry has a blank token.
    EmptyToken,
    /// A protocol's ideal GA is outside 20..=42 weeks.
    InvalidIdealWeeks,
    /// A tolerance band has `max_weeks < min_weeks`, or overlaps or
    /// precedes the previous band.
    InvalidToleranceBand,
    /// A later tolerance band allows less than an earlier one.
    NonMonotonicTolerance,
    /// Ultrasound GA days outside 0..=6.
    InvalidUltrasoundDays,
    /// Ultrasound GA beyond the plausible maximum.
    ImplausibleUltrasoundGa,
    /// A resolver setting or protocol margin is beyond its accepted maximum.
    OutOfRange,
}

impl ValidationError {
    /// Creates an error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a facility capacity snapshot.
pub fn validate_capacity_table(table: &CapacityTable) -> ValidationResult {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for row in table.rows() {
        let key = facility_key(&row.facility);
        if key.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyFacility,
                "Capacity row with empty facility name",
            ));
            continue;
        }
        if !seen.insert(key) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateFacility,
                format!("Duplicate facility: {}", row.facility),
            ));
        }
    }

    finish(errors)
}

/// Validates protocol rows before they are loaded into a table.
pub fn validate_protocol_entries(entries: &[ProtocolEntry]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.token.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyToken,
                "Protocol entry with empty token",
            ));
            continue;
        }
        if !seen.insert(entry.token.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateToken,
                format!("Duplicate protocol token: {}", entry.token),
            ));
        }
        if !(20..=42).contains(&entry.ideal_ga_weeks) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidIdealWeeks,
                format!(
                    "Protocol '{}' has ideal GA {} weeks (expected 20..=42)",
                    entry.token, entry.ideal_ga_weeks
                ),
            ));
        }
        if entry.margin_days > MAX_TOLERANCE_DAYS {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!(
                    "Protocol '{}' has margin {} days (expected at most {})",
                    entry.token, entry.margin_days, MAX_TOLERANCE_DAYS
                ),
            ));
        }
    }

    finish(errors)
}

/// Validates the scalar resolver options and the tolerance table.
pub fn validate_resolver_config(config: &ResolverConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let limits = [
        (
            "minimum_lead_time_days",
            config.minimum_lead_time_days,
            MAX_LEAD_TIME_DAYS,
        ),
        (
            "search_window_days",
            config.search_window_days,
            MAX_SEARCH_WINDOW_DAYS,
        ),
        (
            "default_margin_days",
            config.default_margin_days,
            MAX_TOLERANCE_DAYS,
        ),
        (
            "ga_deviation_tolerance_days",
            config.ga_deviation_tolerance_days,
            MAX_TOLERANCE_DAYS,
        ),
    ];
    for (name, value, max) in limits {
        if value > max {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfRange,
                format!("{name} is {value} (expected at most {max})"),
            ));
        }
    }

    if !(20..=42).contains(&config.default_ideal_ga_weeks) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidIdealWeeks,
            format!(
                "default_ideal_ga_weeks is {} (expected 20..=42)",
                config.default_ideal_ga_weeks
            ),
        ));
    }

    if let Err(e) = validate_tolerance_table(&config.tolerance) {
        errors.extend(e);
    }

    finish(errors)
}

/// Validates a tolerance table.
///
/// Bands must be listed in ascending order without overlap, only the last
/// band may be open-ended, and tolerance must never decrease with GA
/// (including against `below_range_days`).
pub fn validate_tolerance_table(table: &ToleranceTable) -> ValidationResult {
    let mut errors = Vec::new();
    let mut previous_max: Option<u32> = None;
    let mut previous_tolerance = table.below_range_days;
    let last = table.bands.len().saturating_sub(1);

    for (i, band) in table.bands.iter().enumerate() {
        match band.max_weeks {
            Some(max) if max < band.min_weeks => errors.push(ValidationError::new(
                ValidationErrorKind::InvalidToleranceBand,
                format!("Tolerance band {i}: max_weeks {max} < min_weeks {}", band.min_weeks),
            )),
            None if i != last => errors.push(ValidationError::new(
                ValidationErrorKind::InvalidToleranceBand,
                format!("Tolerance band {i}: only the last band may be open-ended"),
            )),
            _ => {}
        }

        if let Some(prev) = previous_max {
            if band.min_weeks <= prev {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidToleranceBand,
                    format!(
                        "Tolerance band {i} starts at week {} inside or before the previous band",
                        band.min_weeks
                    ),
                ));
            }
        }

        if band.tolerance_days < previous_tolerance {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonMonotonicTolerance,
                format!(
                    "Tolerance band {i} allows {} days, less than the {} days before it",
                    band.tolerance_days, previous_tolerance
                ),
            ));
        }

        previous_max = Some(band.max_weeks.unwrap_or(u32::MAX));
        previous_tolerance = band.tolerance_days;
    }

    finish(errors)
}

/// Validates a clinical dating record.
pub fn validate_clinical_dates(dates: &ClinicalDates) -> ValidationResult {
    let mut errors = Vec::new();

    if dates.ultrasound_ga_days > 6 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidUltrasoundDays,
            format!(
                "Ultrasound GA days must be 0..=6, got {}",
                dates.ultrasound_ga_days
            ),
        ));
    }
    if dates.ultrasound_ga_total_days() > MAX_GA_DAYS {
        errors.push(ValidationError::new(
            ValidationErrorKind::ImplausibleUltrasoundGa,
            format!(
                "Ultrasound GA {}w{}d exceeds {} days",
                dates.ultrasound_ga_weeks, dates.ultrasound_ga_days, MAX_GA_DAYS
            ),
        ));
    }

    finish(errors)
}
