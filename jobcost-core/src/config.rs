//! TOML configuration for route costing, waste estimation and catalogue matching.
//!
//! Every constant is optional at parse time and promoted into a typed value on demand, so a
//! missing fee or threshold is reported as [`ConfigError::Missing`] before anything runs.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::catalogue::FamilyPattern;
use crate::error::ConfigError;
use crate::model::{Address, AddressRole};
use crate::route::{DEFAULT_LOOKUP_TIMEOUT, RouteConfig, ZoneChargePolicy};
use crate::waste::{WasteEstimator, WasteFormula, WasteProfile};

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder regex is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Root of the configuration document.
pub struct Settings {
    /// `[route]` table.
    #[serde(default)]
    pub route: RouteSettings,
    /// `[waste]` table.
    #[serde(default)]
    pub waste: WasteSettings,
    /// `[matching]` table.
    #[serde(default)]
    pub matching: MatchingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Base address, fees and thresholds.
pub struct RouteSettings {
    /// Label of the depot.
    pub base_label: Option<String>,
    /// Postcode of the depot.
    pub base_postcode: Option<String>,
    /// Flat congestion zone fee.
    pub congestion_fee: Option<f64>,
    /// Flat emission zone fee.
    pub emission_zone_fee: Option<f64>,
    /// Fuel cost per mile.
    pub fuel_cost_per_mile: Option<f64>,
    /// Overnight accommodation threshold in miles.
    pub long_journey_miles: Option<f64>,
    /// Second driver threshold in minutes.
    pub long_duration_minutes: Option<f64>,
    /// Per-lookup timeout in milliseconds.
    pub lookup_timeout_ms: Option<u64>,
    /// Repeat charging policy.
    pub zone_charge_policy: Option<ZoneChargePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Waste formula constants and fixed family profiles.
pub struct WasteSettings {
    /// Volume every product produces.
    pub base: Option<f64>,
    /// Extra volume per install hour.
    pub time_factor: Option<f64>,
    /// Factor for heavy products.
    pub heavy_multiplier: Option<f64>,
    /// Upper bound of any per-unit volume.
    pub max_cap: Option<f64>,
    /// `[[waste.profiles]]` entries.
    #[serde(default)]
    pub profiles: Vec<WasteProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Structural matchers appended after exact and alias matching.
pub struct MatchingSettings {
    /// `[[matching.families]]` entries, tried in order.
    #[serde(default)]
    pub families: Vec<FamilyPattern>,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings, replacing `${VAR}` placeholders from the environment first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is not valid for the schema.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&expand_env(content))?)
    }

    /// The depot every route starts and ends at.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the postcode is absent or malformed.
    pub fn base_address(&self) -> Result<Address, ConfigError> {
        let postcode = self
            .route
            .base_postcode
            .as_deref()
            .ok_or_else(|| ConfigError::missing("route.base_postcode"))?;
        let label = self.route.base_label.as_deref().unwrap_or("Base");

        Address::new(label, postcode, AddressRole::Base).map_err(|err| {
            ConfigError::invalid("route.base_postcode", postcode, &err.to_string())
        })
    }

    /// Typed route configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing or invalid constants.
    pub fn route_config(&self) -> Result<RouteConfig, ConfigError> {
        RouteConfig::try_from(&self.route)
    }

    /// Waste estimator built from the formula constants and profiles.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing or invalid constants.
    pub fn waste_estimator(&self) -> Result<WasteEstimator, ConfigError> {
        let formula = WasteFormula::try_from(&self.waste)?;
        WasteEstimator::new(self.waste.profiles.clone(), formula)
    }
}

impl TryFrom<&RouteSettings> for RouteConfig {
    type Error = ConfigError;

    fn try_from(settings: &RouteSettings) -> Result<Self, Self::Error> {
        let config = RouteConfig {
            congestion_fee: required(settings.congestion_fee, "route.congestion_fee")?,
            emission_zone_fee: required(settings.emission_zone_fee, "route.emission_zone_fee")?,
            fuel_cost_per_mile: required(settings.fuel_cost_per_mile, "route.fuel_cost_per_mile")?,
            long_journey_miles: required(settings.long_journey_miles, "route.long_journey_miles")?,
            long_duration_minutes: required(
                settings.long_duration_minutes,
                "route.long_duration_minutes",
            )?,
            lookup_timeout: settings
                .lookup_timeout_ms
                .map_or(DEFAULT_LOOKUP_TIMEOUT, Duration::from_millis),
            zone_charge_policy: settings.zone_charge_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<&WasteSettings> for WasteFormula {
    type Error = ConfigError;

    fn try_from(settings: &WasteSettings) -> Result<Self, Self::Error> {
        let formula = WasteFormula {
            base: required(settings.base, "waste.base")?,
            time_factor: required(settings.time_factor, "waste.time_factor")?,
            heavy_multiplier: required(settings.heavy_multiplier, "waste.heavy_multiplier")?,
            max_cap: required(settings.max_cap, "waste.max_cap")?,
        };
        formula.validate()?;
        Ok(formula)
    }
}

/// Replace `${NAME}` placeholders with environment variables; unset names stay as they are.
#[must_use]
pub fn expand_env(content: &str) -> String {
    substitute_vars(content, |name| env::var(name).ok())
}

fn required(value: Option<f64>, field: &str) -> Result<f64, ConfigError> {
    value.ok_or_else(|| ConfigError::missing(field))
}

/// Replace `${NAME}` placeholders using `lookup`; unknown names are left as they are.
fn substitute_vars<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| {
            let name = caps.get(1).map_or("", |name| name.as_str());
            lookup(name).unwrap_or_else(|| format!("${{{name}}}"))
        })
        .into_owned()
}
