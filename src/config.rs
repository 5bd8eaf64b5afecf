//! Resolver configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys take the
//! defaults below and missing tables fall back to the built-in facility
//! and protocol catalogues.
//!
//! ```toml
//! [resolver]
//! minimum_lead_time_days = 10
//! search_window_days = 7
//! no_booking_weekday = "Sun"
//!
//! [[facilities]]
//! facility = "Salvalus"
//! weekday_capacity = 9
//! saturday_capacity = 7
//!
//! [[protocols]]
//! token = "pre-eclampsia"
//! ideal_ga_weeks = 37
//! margin_days = 7
//! category = "Maternal"
//! ```

use std::fs;
use std::path::Path;

use chrono::Weekday;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gestation::{GaCalculator, ToleranceTable};
use crate::models::{CapacityTable, FacilityCapacity};
use crate::protocol::{ProtocolEntry, ProtocolTable};
use crate::validation::{
    validate_capacity_table, validate_protocol_entries, validate_resolver_config,
};

fn default_minimum_lead_time_days() -> u32 {
    10
}

fn default_search_window_days() -> u32 {
    7
}

fn default_no_booking_weekday() -> Weekday {
    Weekday::Sun
}

fn default_ideal_ga_weeks() -> u32 {
    crate::protocol::DEFAULT_IDEAL_GA_WEEKS
}

fn default_margin_days() -> u32 {
    crate::protocol::DEFAULT_MARGIN_DAYS
}

fn default_ga_deviation_tolerance_days() -> u32 {
    7
}

/// Scalar resolver options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Earliest allowed target date, in days after the reference date.
    #[serde(default = "default_minimum_lead_time_days")]
    pub minimum_lead_time_days: u32,
    /// Slot search radius in days.
    #[serde(default = "default_search_window_days")]
    pub search_window_days: u32,
    /// Weekday on which target dates are never placed.
    #[serde(default = "default_no_booking_weekday")]
    pub no_booking_weekday: Weekday,
    /// Ideal GA when no protocol matches.
    #[serde(default = "default_ideal_ga_weeks")]
    pub default_ideal_ga_weeks: u32,
    /// Margin when no protocol matches.
    #[serde(default = "default_margin_days")]
    pub default_margin_days: u32,
    /// Allowed gap between the GA on the booked date and the ideal GA
    /// before a plan is flagged.
    #[serde(default = "default_ga_deviation_tolerance_days")]
    pub ga_deviation_tolerance_days: u32,
    /// LMP/ultrasound tolerance table.
    #[serde(default)]
    pub tolerance: ToleranceTable,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            minimum_lead_time_days: default_minimum_lead_time_days(),
            search_window_days: default_search_window_days(),
            no_booking_weekday: default_no_booking_weekday(),
            default_ideal_ga_weeks: default_ideal_ga_weeks(),
            default_margin_days: default_margin_days(),
            ga_deviation_tolerance_days: default_ga_deviation_tolerance_days(),
            tolerance: ToleranceTable::default(),
        }
    }
}

impl ResolverConfig {
    /// GA calculator using this tolerance table.
    pub fn ga_calculator(&self) -> GaCalculator {
        GaCalculator::new().with_tolerance(self.tolerance.clone())
    }
}

/// Full configuration: resolver options plus the capacity and protocol
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Resolver options.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Facility rows; built-in rows when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<FacilityCapacity>>,
    /// Protocol rows; built-in catalogue when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<ProtocolEntry>>,
}

impl SchedulingConfig {
    /// Loads and validates a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("loading scheduling config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SchedulingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Runs every structural check, reporting all problems together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if let Err(e) = validate_capacity_table(&self.capacity_table()) {
            errors.extend(e);
        }
        if let Some(protocols) = &self.protocols {
            if let Err(e) = validate_protocol_entries(protocols) {
                errors.extend(e);
            }
        }
        if let Err(e) = validate_resolver_config(&self.resolver) {
            errors.extend(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Capacity snapshot.
    pub fn capacity_table(&self) -> CapacityTable {
        self.facilities
            .clone()
            .map_or_else(CapacityTable::builtin, CapacityTable::new)
    }

    /// Protocol snapshot, with the configured no-match defaults.
    pub fn protocol_table(&self) -> ProtocolTable {
        let table = self
            .protocols
            .clone()
            .map_or_else(ProtocolTable::builtin, ProtocolTable::new);
        table.with_defaults(
            self.resolver.default_ideal_ga_weeks,
            self.resolver.default_margin_days,
        )
    }
}
