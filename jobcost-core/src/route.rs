//! Multi-leg route costing with partial-failure tolerance.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use futures::future::{join, join_all};
use serde::{Deserialize, Serialize};
use tokio::time;

use crate::error::{ConfigError, RouteError, ValidationError};
use crate::model::{
    Address, AddressRole, LegDistance, LogisticsResult, Postcode, RouteLeg, ZoneKind,
};
use crate::ports::PortError;
use crate::providers::ProviderSet;

/// Lookup timeout used when none is configured.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

const ZONES: [ZoneKind; 2] = [ZoneKind::Congestion, ZoneKind::EmissionZone];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How often a zone fee is charged when stops repeat within a route.
pub enum ZoneChargePolicy {
    /// Once per distinct postcode inside the zone.
    #[default]
    PerUniquePostcode,
    /// Once for every leg start or end inside the zone.
    PerLegEndpoint,
    /// At most once per zone for the whole route.
    OncePerRoute,
}

#[derive(Debug, Clone, PartialEq)]
/// Fees, thresholds and lookup behaviour for route costing.
pub struct RouteConfig {
    /// Flat fee per congestion zone charge.
    pub congestion_fee: f64,
    /// Flat fee per emission zone charge.
    pub emission_zone_fee: f64,
    /// Fuel cost per mile driven.
    pub fuel_cost_per_mile: f64,
    /// Distances above this many miles need overnight accommodation.
    pub long_journey_miles: f64,
    /// Drive times above this many minutes need a second driver.
    pub long_duration_minutes: f64,
    /// Timeout applied to every single lookup.
    pub lookup_timeout: Duration,
    /// Repeat charging policy.
    pub zone_charge_policy: ZoneChargePolicy,
}

impl RouteConfig {
    /// Check every constant is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending constant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("route.congestion_fee", self.congestion_fee),
            ("route.emission_zone_fee", self.emission_zone_fee),
            ("route.fuel_cost_per_mile", self.fuel_cost_per_mile),
            ("route.long_journey_miles", self.long_journey_miles),
            ("route.long_duration_minutes", self.long_duration_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    value,
                    "must be a non-negative number",
                ));
            }
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "route.lookup_timeout_ms",
                0,
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn fee(&self, zone: ZoneKind) -> f64 {
        match zone {
            ZoneKind::Congestion => self.congestion_fee,
            ZoneKind::EmissionZone => self.emission_zone_fee,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Addresses for one job route.
pub struct RouteRequest {
    /// Depot the route starts and ends at.
    pub base: Option<Address>,
    /// Optional pickup before the site.
    pub collection: Option<Address>,
    /// Job site.
    pub site: Option<Address>,
}

impl RouteRequest {
    /// Route from `base` to `site` and back.
    #[must_use]
    pub fn new(base: Address, site: Address) -> Self {
        Self {
            base: Some(base),
            collection: None,
            site: Some(site),
        }
    }

    /// Add a collection stop before the site.
    #[must_use]
    pub fn with_collection(mut self, collection: Address) -> Self {
        self.collection = Some(collection);
        self
    }
}

/// Builds and costs job routes using injected lookups.
pub struct RouteCalculator {
    providers: ProviderSet,
    config: RouteConfig,
}

impl RouteCalculator {
    /// Create a calculator; configuration problems surface here, before any lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration is invalid.
    pub fn new(providers: ProviderSet, config: RouteConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { providers, config })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Cost a route. Lookup failures and timeouts become warnings; only missing site or base
    /// addresses fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Validation`] when the site or base address is missing.
    pub async fn compute_route(
        &self,
        request: &RouteRequest,
    ) -> Result<LogisticsResult, RouteError> {
        let site = request
            .site
            .as_ref()
            .ok_or(ValidationError::MissingAddress {
                role: AddressRole::Site,
            })?;
        let base = request
            .base
            .as_ref()
            .ok_or(ValidationError::MissingAddress {
                role: AddressRole::Base,
            })?;

        let stops = plan_stops(base, request.collection.as_ref(), site);
        let legs: Vec<(&Address, &Address)> = stops
            .iter()
            .copied()
            .zip(stops.iter().skip(1).copied())
            .collect();

        // Every stop between leaving and returning to base.
        let visits: Vec<&Address> = stops
            .iter()
            .skip(1)
            .take(stops.len().saturating_sub(2))
            .copied()
            .collect();

        let (distances, zones) =
            join(self.lookup_distances(&legs), self.lookup_zones(&visits)).await;

        let mut result = LogisticsResult::default();

        for &(from, to) in &legs {
            match distances.get(&(&from.postcode, &to.postcode)) {
                Some(Ok(measured)) => {
                    result.total_distance_miles += measured.distance_miles;
                    result.total_duration_minutes += measured.duration_minutes;
                    result.legs.push(RouteLeg {
                        from_label: from.label.clone(),
                        to_label: to.label.clone(),
                        from_postcode: from.postcode.clone(),
                        to_postcode: to.postcode.clone(),
                        distance_miles: measured.distance_miles,
                        duration_minutes: measured.duration_minutes,
                    });
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        from = %from.postcode,
                        to = %to.postcode,
                        error = %err,
                        "distance lookup failed"
                    );
                    result.warnings.push(format!(
                        "Distance lookup failed for {} ({}) -> {} ({}): {err}",
                        from.label, from.postcode, to.label, to.postcode
                    ));
                }
                None => {}
            }
        }

        self.apply_zone_charges(&legs, &visits, &zones, &mut result);
        self.apply_operational_warnings(&mut result);

        result.estimated_fuel_cost =
            round_pence(result.total_distance_miles * self.config.fuel_cost_per_mile);

        tracing::info!(
            legs = result.legs.len(),
            planned_legs = legs.len(),
            miles = result.total_distance_miles,
            minutes = result.total_duration_minutes,
            warnings = result.warnings.len(),
            "route computed"
        );

        Ok(result)
    }

    /// Like [`compute_route`](Self::compute_route), but abandons all outstanding lookups and
    /// returns [`RouteError::Cancelled`] once `cancelled` completes.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Cancelled`] on cancellation, otherwise as `compute_route`.
    pub async fn compute_route_until<F>(
        &self,
        request: &RouteRequest,
        cancelled: F,
    ) -> Result<LogisticsResult, RouteError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancelled => {
                tracing::debug!("route calculation cancelled by caller");
                Err(RouteError::Cancelled)
            }
            result = self.compute_route(request) => result,
        }
    }

    async fn lookup_distances<'req>(
        &self,
        legs: &[(&'req Address, &'req Address)],
    ) -> HashMap<(&'req Postcode, &'req Postcode), Result<LegDistance, PortError>> {
        let mut pairs: Vec<(&Postcode, &Postcode)> = Vec::with_capacity(legs.len());
        for &(from, to) in legs {
            let pair = (&from.postcode, &to.postcode);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }

        let provider = &self.providers.distance;
        let lookups = pairs.iter().map(|&(from, to)| async move {
            tracing::debug!(provider = provider.name(), %from, %to, "distance lookup");
            self.timed(provider.distance(from, to))
                .await
                .and_then(usable_measurement)
        });
        let results = join_all(lookups).await;

        pairs.into_iter().zip(results).collect()
    }

    async fn lookup_zones<'req>(
        &self,
        visits: &[&'req Address],
    ) -> HashMap<(&'req Postcode, ZoneKind), Result<bool, PortError>> {
        let mut keys: Vec<(&Postcode, ZoneKind)> = Vec::new();
        for &stop in visits {
            for zone in ZONES {
                let key = (&stop.postcode, zone);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let lookups = keys.iter().map(|&(postcode, zone)| async move {
            tracing::debug!(%postcode, %zone, "zone lookup");
            self.timed(self.providers.zones.get(zone).contains(postcode))
                .await
        });
        let results = join_all(lookups).await;

        keys.into_iter().zip(results).collect()
    }

    async fn timed<T, F>(&self, lookup: F) -> Result<T, PortError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        time::timeout(self.config.lookup_timeout, lookup)
            .await
            .unwrap_or_else(|_elapsed| Err(PortError::Timeout(self.config.lookup_timeout)))
    }

    fn apply_zone_charges<'req>(
        &self,
        legs: &[(&'req Address, &'req Address)],
        visits: &[&'req Address],
        zones: &HashMap<(&'req Postcode, ZoneKind), Result<bool, PortError>>,
        result: &mut LogisticsResult,
    ) {
        let occurrences: Vec<&'req Address> = match self.config.zone_charge_policy {
            ZoneChargePolicy::PerLegEndpoint => {
                // The first and last endpoints are the base, whatever its role says.
                let ends: Vec<&'req Address> =
                    legs.iter().flat_map(|&(from, to)| [from, to]).collect();
                ends.iter()
                    .skip(1)
                    .take(ends.len().saturating_sub(2))
                    .copied()
                    .collect()
            }
            ZoneChargePolicy::PerUniquePostcode | ZoneChargePolicy::OncePerRoute => {
                let mut seen = HashSet::new();
                visits
                    .iter()
                    .copied()
                    .filter(|&stop| seen.insert(&stop.postcode))
                    .collect()
            }
        };

        let mut failures_reported = HashSet::new();
        let mut charged_zones = HashSet::new();

        for stop in occurrences {
            for zone in ZONES {
                match zones.get(&(&stop.postcode, zone)) {
                    Some(Ok(true)) => {
                        if self.config.zone_charge_policy == ZoneChargePolicy::OncePerRoute
                            && !charged_zones.insert(zone)
                        {
                            continue;
                        }
                        let fee = self.config.fee(zone);
                        match zone {
                            ZoneKind::Congestion => result.congestion_charge += fee,
                            ZoneKind::EmissionZone => result.ulez_charge += fee,
                        }
                        result.warnings.push(format!(
                            "{} ({}) is inside the {zone}: £{fee:.2} charge applied",
                            stop.label, stop.postcode
                        ));
                    }
                    Some(Ok(false)) => {}
                    Some(Err(err)) => {
                        if failures_reported.insert((&stop.postcode, zone)) {
                            tracing::warn!(
                                postcode = %stop.postcode,
                                %zone,
                                error = %err,
                                "zone lookup failed"
                            );
                            result.warnings.push(format!(
                                "{zone} check failed for {} ({}): {err}",
                                stop.label, stop.postcode
                            ));
                        }
                    }
                    None => {}
                }
            }
        }

        result.congestion_charge = round_pence(result.congestion_charge);
        result.ulez_charge = round_pence(result.ulez_charge);
    }

    fn apply_operational_warnings(&self, result: &mut LogisticsResult) {
        if result.total_distance_miles > self.config.long_journey_miles {
            result.warnings.push(format!(
                "Long journey ({:.1} miles): overnight accommodation may be required",
                result.total_distance_miles
            ));
        }
        if result.total_duration_minutes > self.config.long_duration_minutes {
            let total = result.total_duration_minutes.round();
            let hours = (total / 60.0).floor();
            let minutes = total - hours * 60.0;
            result.warnings.push(format!(
                "Long drive time ({hours:.0}h {minutes:02.0}m): a second driver may be required"
            ));
        }
    }
}

/// Stops in visiting order: base, optional collection, site, base.
fn plan_stops<'req>(
    base: &'req Address,
    collection: Option<&'req Address>,
    site: &'req Address,
) -> Vec<&'req Address> {
    let mut stops = Vec::with_capacity(4);
    stops.push(base);
    if let Some(collection) = collection.filter(|stop| stop.postcode != site.postcode) {
        stops.push(collection);
    }
    stops.push(site);
    stops.push(base);
    stops
}

/// Reject measurements that would poison the route totals.
fn usable_measurement(measured: LegDistance) -> Result<LegDistance, PortError> {
    let usable = |value: f64| value.is_finite() && value >= 0.0;
    if usable(measured.distance_miles) && usable(measured.duration_minutes) {
        Ok(measured)
    } else {
        Err(PortError::InvalidResponse(format!(
            "unusable measurement of {} miles in {} minutes",
            measured.distance_miles, measured.duration_minutes
        )))
    }
}

fn round_pence(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
