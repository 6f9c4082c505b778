//! Domain data structures for catalogue products, quote lines, addresses, and routes.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static POSTCODE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{1,2}[0-9]{1,2}[A-Z]? [0-9][A-Z]{2}$").expect("postcode regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// UK postcode in its canonical `OUTWARD INWARD` spelling, e.g. `SE1 4AA`.
pub struct Postcode(String);

impl Postcode {
    /// Parse a postcode, tolerating case and spacing differences.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPostcode`] when the text does not have the shape of a
    /// UK postcode.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_uppercase())
            .collect();

        let invalid = || ValidationError::InvalidPostcode {
            value: raw.to_owned(),
        };

        if !compact.is_ascii() || compact.len() < 5 {
            return Err(invalid());
        }

        let (outward, inward) = compact.split_at(compact.len() - 3);
        let canonical = format!("{outward} {inward}");

        if POSTCODE_SHAPE.is_match(&canonical) {
            Ok(Self(canonical))
        } else {
            Err(invalid())
        }
    }

    /// Outward code (area + district), e.g. `SE1` for `SE1 4AA`.
    #[must_use]
    pub fn outward(&self) -> &str {
        self.0.split(' ').next().unwrap_or_default()
    }

    /// Inward code (sector + unit), e.g. `4AA` for `SE1 4AA`.
    #[must_use]
    pub fn inward(&self) -> &str {
        self.0.split(' ').nth(1).unwrap_or_default()
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for Postcode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Postcode> for String {
    fn from(postcode: Postcode) -> Self {
        postcode.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Role an address plays in a job route.
pub enum AddressRole {
    /// The depot every route starts and ends at.
    Base,
    /// Where goods are picked up before going to site.
    Collection,
    /// The job site.
    Site,
}

impl fmt::Display for AddressRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressRole::Base => "base",
            AddressRole::Collection => "collection",
            AddressRole::Site => "site",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A labelled stop on a job route.
pub struct Address {
    /// Human-friendly label shown in warnings and reports.
    pub label: String,
    /// Validated postcode used for distance and zone lookups.
    pub postcode: Postcode,
    /// What the stop is used for.
    pub role: AddressRole,
}

impl Address {
    /// Build an address, validating the postcode.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPostcode`] when the postcode is malformed.
    pub fn new<L: Into<String>>(
        label: L,
        postcode: &str,
        role: AddressRole,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            label: label.into(),
            postcode: Postcode::parse(postcode)?,
            role,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Canonical catalogue product as loaded from the catalogue store.
pub struct CatalogueEntry {
    /// Unique canonical key, e.g. `FLX 4P`.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Hours needed to install one unit.
    pub install_time_hours: f64,
    /// Waste generated per unit; zero means "estimate it".
    #[serde(default)]
    pub waste_volume_m3: f64,
    /// Whether the product needs heavy handling.
    #[serde(default)]
    pub is_heavy: bool,
    /// Free-form product category.
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Alternate text known to refer to a canonical key.
pub struct AliasMapping {
    /// Raw alias text as entered by users.
    pub alias: String,
    /// Canonical key the alias points at.
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How a product line was matched to the catalogue.
pub enum MatchConfidence {
    /// Normalized text equals a catalogue key.
    Exact,
    /// Normalized text equals a known alias.
    Alias,
    /// Derived from the structure of a product family code.
    Pattern,
}

impl fmt::Display for MatchConfidence {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::Alias => "alias",
            MatchConfidence::Pattern => "pattern",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Catalogue data attached to a successfully matched line.
pub struct ResolvedProduct {
    /// Canonical key of the matched entry.
    pub canonical_key: String,
    /// Display name of the matched entry.
    pub name: String,
    /// Category of the matched entry.
    pub category: String,
    /// Install time per unit in hours.
    pub install_time_hours: f64,
    /// Waste per unit recorded in the catalogue.
    pub waste_volume_m3: f64,
    /// Heavy handling flag.
    pub is_heavy: bool,
    /// Which matcher produced the result.
    pub confidence: MatchConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Outcome of matching one raw product line against the catalogue.
pub enum ResolvedLine {
    /// The line maps to a catalogue entry.
    Resolved(ResolvedProduct),
    /// No match; install time must be entered manually.
    Unresolved {
        /// Why matching failed.
        reason: String,
    },
}

impl ResolvedLine {
    /// Whether the line needs a manual install time downstream.
    #[must_use]
    pub fn requires_manual_entry(&self) -> bool {
        matches!(self, ResolvedLine::Unresolved { .. })
    }

    /// The matched product, if any.
    #[must_use]
    pub fn product(&self) -> Option<&ResolvedProduct> {
        match self {
            ResolvedLine::Resolved(product) => Some(product),
            ResolvedLine::Unresolved { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One raw line item from a quote.
pub struct ProductLineInput {
    /// Product code as typed or imported.
    #[serde(default)]
    pub product_code: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Number of units, always positive.
    pub quantity: u32,
    /// Install hours supplied by the user, overriding the catalogue.
    #[serde(default)]
    pub manual_install_hours: Option<f64>,
}

impl ProductLineInput {
    /// Construct a line without a manual override.
    #[must_use]
    pub fn new<C: Into<String>, D: Into<String>>(code: C, description: D, quantity: u32) -> Self {
        Self {
            product_code: code.into(),
            description: description.into(),
            quantity,
            manual_install_hours: None,
        }
    }

    /// Attach a manual install time override.
    #[must_use]
    pub fn with_manual_hours(mut self, hours: f64) -> Self {
        self.manual_install_hours = Some(hours);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A processed quote line.
pub struct QuoteLine {
    /// The line as received.
    pub input: ProductLineInput,
    /// Catalogue matching outcome.
    pub resolution: ResolvedLine,
    /// Manual override or catalogue hours; `None` when nothing is known yet.
    pub install_time_hours: Option<f64>,
    /// Waste volume per unit in cubic metres.
    pub waste_per_unit_m3: f64,
}

impl QuoteLine {
    /// Waste for the whole line (`per unit × quantity`).
    #[must_use]
    pub fn line_waste_m3(&self) -> f64 {
        self.waste_per_unit_m3 * f64::from(self.input.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Processed quote lines plus totals for downstream sizing.
pub struct QuoteBatch {
    /// Lines in input order.
    pub lines: Vec<QuoteLine>,
    /// Σ(waste per unit × quantity).
    pub total_waste_m3: f64,
    /// Σ(install hours × quantity) over lines with known hours.
    pub total_install_hours: f64,
    /// Lines still waiting for a manual install time.
    pub unresolved_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Distance and drive time between two postcodes.
pub struct LegDistance {
    /// Road distance in miles.
    pub distance_miles: f64,
    /// Drive time in minutes.
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One successfully measured segment of a route.
pub struct RouteLeg {
    /// Label of the starting stop.
    pub from_label: String,
    /// Label of the destination stop.
    pub to_label: String,
    /// Postcode of the starting stop.
    pub from_postcode: Postcode,
    /// Postcode of the destination stop.
    pub to_postcode: Postcode,
    /// Road distance in miles.
    pub distance_miles: f64,
    /// Drive time in minutes.
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Charging zones checked for every non-base stop.
pub enum ZoneKind {
    /// Central London congestion charge.
    Congestion,
    /// Ultra low emission zone.
    EmissionZone,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneKind::Congestion => "Congestion Charge zone",
            ZoneKind::EmissionZone => "ULEZ",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Costed route for one job.
pub struct LogisticsResult {
    /// Measured legs in route order (base → … → base).
    pub legs: Vec<RouteLeg>,
    /// Sum of leg distances.
    pub total_distance_miles: f64,
    /// Sum of leg durations.
    pub total_duration_minutes: f64,
    /// Emission zone charges.
    pub ulez_charge: f64,
    /// Congestion zone charges.
    pub congestion_charge: f64,
    /// Degraded lookups, zone hits and operational notes, in a stable order.
    pub warnings: Vec<String>,
    /// Fuel cost rounded to pence.
    pub estimated_fuel_cost: f64,
}

impl LogisticsResult {
    /// Zone charges combined.
    #[must_use]
    pub fn total_charges(&self) -> f64 {
        self.ulez_charge + self.congestion_charge
    }

    /// Zone charges plus fuel.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.total_charges() + self.estimated_fuel_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postcode_is_canonicalised() {
        let postcode = Postcode::parse(" se14aa ").expect("valid postcode");
        assert_eq!(postcode.as_str(), "SE1 4AA");
        assert_eq!(postcode.outward(), "SE1");
        assert_eq!(postcode.inward(), "4AA");

        let spaced = Postcode::parse("EC1A  1BB").expect("valid postcode");
        assert_eq!(spaced.as_str(), "EC1A 1BB");
    }

    #[test]
    fn postcode_rejects_wrong_shapes() {
        for raw in ["", "1AB 2CD", "SE1", "SE1 AAA", "ABC1 1AA", "B1 1RSX"] {
            assert!(Postcode::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn resolved_line_reports_manual_entry() {
        let unresolved = ResolvedLine::Unresolved {
            reason: "no catalogue or alias match".to_owned(),
        };
        assert!(unresolved.requires_manual_entry());
        assert!(unresolved.product().is_none());
    }
}
