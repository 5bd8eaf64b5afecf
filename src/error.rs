//! Error types per concern.
//!
//! Slot exhaustion is not an error: it is reported as
//! [`SlotResult::NeedsManualReview`](crate::scheduler::SlotResult).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::BookingId;
use crate::validation::ValidationError;

/// Gestational age could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GaError {
    /// Neither a reliable LMP nor an ultrasound was recorded.
    #[error("no usable dating source: LMP missing or unreliable and no ultrasound recorded")]
    NoUsableSource,

    /// Inputs are present but inconsistent.
    #[error("invalid dating inputs: {0}")]
    InvalidDates(String),
}

/// A store write failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PersistError {
    /// The booking does not exist in the store.
    #[error("booking {0} not found")]
    NotFound(BookingId),

    /// The write conflicts with existing state.
    #[error("conflict on booking {id}: {reason}")]
    Conflict {
        /// Booking concerned.
        id: BookingId,
        /// What conflicted.
        reason: String,
    },

    /// Backend failure.
    #[error("store error: {0}")]
    Store(String),
}

impl From<String> for PersistError {
    fn from(s: String) -> Self {
        PersistError::Store(s)
    }
}

impl From<&str> for PersistError {
    fn from(s: &str) -> Self {
        PersistError::Store(s.to_string())
    }
}

/// The booking pipeline could not produce a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Dating failed.
    #[error(transparent)]
    Ga(#[from] GaError),

    /// The requested facility has no capacity row.
    #[error("unknown facility: {0}")]
    UnknownFacility(String),

    /// The reservation could not be stored.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but failed validation.
    #[error("invalid config: {}", summarize(.0))]
    Invalid(Vec<ValidationError>),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_ga_error_into_schedule_error() {
        let err: ScheduleError = GaError::NoUsableSource.into();
        assert!(matches!(err, ScheduleError::Ga(GaError::NoUsableSource)));
        assert!(err.to_string().contains("no usable dating source"));
    }

    #[test]
    fn test_persist_error_from_str() {
        let err: PersistError = "connection reset".into();
        assert_eq!(err, PersistError::Store("connection reset".into()));
        assert_eq!(
            PersistError::NotFound(BookingId::new("B9")).to_string(),
            "booking B9 not found"
        );
    }

    #[test]
    fn test_config_invalid_lists_messages() {
        let err = ConfigError::Invalid(vec![
            ValidationError::new(ValidationErrorKind::DuplicateFacility, "dup A"),
            ValidationError::new(ValidationErrorKind::EmptyToken, "empty"),
        ]);
        assert_eq!(err.to_string(), "invalid config: dup A; empty");
    }
}
