//! Error taxonomy for validation, configuration, catalogue loading, and route calculation.

use std::io;

use crate::model::AddressRole;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Caller supplied input that cannot be processed.
pub enum ValidationError {
    /// A required address is absent.
    #[error("Missing {role} address")]
    MissingAddress {
        /// Which address is missing.
        role: AddressRole,
    },
    /// Text that is not a UK postcode.
    #[error("Invalid postcode: {value:?}")]
    InvalidPostcode {
        /// The rejected input.
        value: String,
    },
    /// A quote line with neither product code nor description.
    #[error("Line {index} has no product code or description")]
    EmptyLine {
        /// Zero-based position in the batch.
        index: usize,
    },
    /// A quote line with a zero quantity.
    #[error("Line {index} has invalid quantity {quantity}")]
    InvalidQuantity {
        /// Zero-based position in the batch.
        index: usize,
        /// The rejected quantity.
        quantity: u32,
    },
    /// A distance or drive time that is negative or not a number.
    #[error("Invalid measurement {from} -> {to}: {miles} miles, {minutes} minutes")]
    InvalidMeasurement {
        /// One end of the pair.
        from: String,
        /// Other end of the pair.
        to: String,
        /// The given distance.
        miles: f64,
        /// The given drive time.
        minutes: f64,
    },
    /// A manual install time that is negative or not a number.
    #[error("Line {index} has invalid manual install hours {hours}")]
    InvalidManualHours {
        /// Zero-based position in the batch.
        index: usize,
        /// The rejected value.
        hours: f64,
    },
}

#[derive(thiserror::Error, Debug)]
/// A required constant is absent or unusable.
pub enum ConfigError {
    /// Option not supplied.
    #[error("Missing configuration value: {field}")]
    Missing {
        /// Dotted path of the option.
        field: String,
    },
    /// Option supplied with an unusable value.
    #[error("Invalid configuration value for {field}: {value} ({reason})")]
    Invalid {
        /// Dotted path of the option.
        field: String,
        /// The rejected value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The configuration document is not valid TOML for the expected schema.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration file could not be read.
    #[error("Configuration IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConfigError {
    pub(crate) fn missing(field: &str) -> Self {
        ConfigError::Missing {
            field: field.to_owned(),
        }
    }

    pub(crate) fn invalid<V: ToString>(field: &str, value: V, reason: &str) -> Self {
        ConfigError::Invalid {
            field: field.to_owned(),
            value: value.to_string(),
            reason: reason.to_owned(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// A catalogue snapshot that violates its invariants.
pub enum CatalogueError {
    /// Two entries normalize to the same key.
    #[error("Duplicate catalogue key {key:?} (clashes with {existing:?})")]
    DuplicateKey {
        /// The rejected key.
        key: String,
        /// The key loaded first.
        existing: String,
    },
    /// An entry with negative or non-finite numbers.
    #[error("Invalid catalogue entry {key:?}: {reason}")]
    InvalidEntry {
        /// Key of the rejected entry.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A family pattern that cannot be compiled.
    #[error("Invalid family pattern {family:?}: {reason}")]
    InvalidFamily {
        /// Family token of the rejected pattern.
        family: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Reasons a route calculation does not produce a result.
pub enum RouteError {
    /// Required input is missing or malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The caller abandoned the request.
    #[error("Route calculation cancelled")]
    Cancelled,
}
