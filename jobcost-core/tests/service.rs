//! End-to-end checks of the service facade with in-memory lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobcost_core::{
    Address, AddressRole, AliasMapping, CatalogueEntry, ConfigError, DistanceProvider,
    JobCostService, LegDistance, MatchConfidence, PortError, Postcode, ProductLineInput,
    ProviderSet, RouteError, Settings, ValidationError, ZoneKind, ZoneProvider, ZoneProviders,
};

const SETTINGS: &str = r#"
[route]
base_label = "Depot"
base_postcode = "SE1 4AA"
congestion_fee = 15.0
emission_zone_fee = 12.5
fuel_cost_per_mile = 0.5
long_journey_miles = 200.0
long_duration_minutes = 600.0

[waste]
base = 0.2
time_factor = 0.3
heavy_multiplier = 1.5
max_cap = 2.0

[[matching.families]]
family = "FLX"
suffix = "P"
"#;

struct TableDistance(HashMap<(String, String), LegDistance>);

#[async_trait]
impl DistanceProvider for TableDistance {
    fn name(&self) -> &str {
        "table"
    }

    async fn distance(&self, from: &Postcode, to: &Postcode) -> Result<LegDistance, PortError> {
        self.0
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| PortError::NoRoute {
                from: from.clone(),
                to: to.clone(),
            })
    }
}

struct OutwardZone {
    zone: ZoneKind,
    outward: &'static str,
}

#[async_trait]
impl ZoneProvider for OutwardZone {
    fn zone(&self) -> ZoneKind {
        self.zone
    }

    async fn contains(&self, postcode: &Postcode) -> Result<bool, PortError> {
        Ok(postcode.outward() == self.outward)
    }
}

fn providers() -> ProviderSet {
    let legs = [
        ("SE1 4AA", "SE1 3ER", 1.5, 10.0),
        ("SE1 3ER", "B1 1RS", 120.0, 140.0),
        ("B1 1RS", "SE1 4AA", 121.0, 150.0),
        ("SE1 4AA", "B1 1RS", 121.5, 145.0),
    ];
    let table = legs
        .iter()
        .map(|&(from, to, distance_miles, duration_minutes)| {
            (
                (from.to_owned(), to.to_owned()),
                LegDistance {
                    distance_miles,
                    duration_minutes,
                },
            )
        })
        .collect();

    let zones: Vec<Arc<dyn ZoneProvider>> = vec![
        Arc::new(OutwardZone {
            zone: ZoneKind::Congestion,
            outward: "SE1",
        }),
        Arc::new(OutwardZone {
            zone: ZoneKind::EmissionZone,
            outward: "SE1",
        }),
    ];

    ProviderSet::new(
        Arc::new(TableDistance(table)),
        ZoneProviders::new(zones).expect("both zones"),
    )
}

fn service() -> JobCostService {
    let settings = Settings::from_toml_str(SETTINGS).expect("valid settings");
    JobCostService::new(&settings, providers()).expect("valid service")
}

fn entry(key: &str, hours: f64) -> CatalogueEntry {
    CatalogueEntry {
        key: key.to_owned(),
        name: key.to_owned(),
        install_time_hours: hours,
        waste_volume_m3: 0.0,
        is_heavy: false,
        category: "furniture".to_owned(),
    }
}

#[test]
fn quote_resolves_family_alias_and_unknown_lines() {
    let service = service();
    let catalogue = service
        .catalogue(
            vec![entry("FLX 4P", 2.5), entry("JUST A CHAIR", 0.25)],
            vec![AliasMapping {
                alias: "Operator chair".to_owned(),
                key: "JUST A CHAIR".to_owned(),
            }],
        )
        .expect("valid catalogue");

    let batch = service
        .quote(
            &[
                ProductLineInput::new("FLX_4P_2816_A", "", 4),
                ProductLineInput::new("", "operator-chair", 6),
                ProductLineInput::new("UNKNOWN-999", "", 1),
            ],
            &catalogue,
        )
        .expect("valid batch");

    let confidences: Vec<Option<MatchConfidence>> = batch
        .lines
        .iter()
        .map(|line| line.resolution.product().map(|product| product.confidence))
        .collect();
    assert_eq!(
        confidences,
        vec![
            Some(MatchConfidence::Pattern),
            Some(MatchConfidence::Alias),
            None
        ]
    );
    assert_eq!(batch.unresolved_count, 1);

    let expected: f64 = batch
        .lines
        .iter()
        .map(|line| line.waste_per_unit_m3 * f64::from(line.input.quantity))
        .sum();
    assert!((batch.total_waste_m3 - expected).abs() < 1e-9);
}

#[tokio::test]
async fn route_from_configured_base() {
    let service = service();
    let site = Address::new("Birmingham site", "B1 1RS", AddressRole::Site).expect("valid");
    let collection =
        Address::new("Supplier", "SE1 3ER", AddressRole::Collection).expect("valid");

    let result = service
        .route(Some(site), Some(collection))
        .await
        .expect("route");

    let labels: Vec<(&str, &str)> = result
        .legs
        .iter()
        .map(|leg| (leg.from_label.as_str(), leg.to_label.as_str()))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("Depot", "Supplier"),
            ("Supplier", "Birmingham site"),
            ("Birmingham site", "Depot"),
        ]
    );
    assert!((result.total_distance_miles - 242.5).abs() < 1e-9);
    assert!((result.congestion_charge - 15.0).abs() < 1e-9);
    assert!((result.ulez_charge - 12.5).abs() < 1e-9);
    assert!((result.estimated_fuel_cost - 121.25).abs() < 1e-9);
    assert!(
        result
            .warnings
            .iter()
            .any(|warning| warning.starts_with("Long journey (242.5 miles)"))
    );
}

#[tokio::test]
async fn route_without_site_is_a_validation_error() {
    let result = service().route(None, None).await;
    assert_eq!(
        result,
        Err(RouteError::Validation(ValidationError::MissingAddress {
            role: AddressRole::Site
        }))
    );
}

#[tokio::test]
async fn route_until_reports_cancellation() {
    let site = Address::new("Birmingham site", "B1 1RS", AddressRole::Site).expect("valid");
    let result = service()
        .route_until(Some(site), None, std::future::ready(()))
        .await;
    assert_eq!(result, Err(RouteError::Cancelled));
}

#[tokio::test]
async fn route_until_completes_when_not_cancelled() {
    let site = Address::new("Birmingham site", "B1 1RS", AddressRole::Site).expect("valid");
    let result = service()
        .route_until(Some(site), None, std::future::pending())
        .await
        .expect("route");
    assert_eq!(result.legs.len(), 2);
}

#[test]
fn missing_constant_fails_at_construction() {
    let settings = Settings::from_toml_str(&SETTINGS.replace("fuel_cost_per_mile = 0.5", ""))
        .expect("parses");
    let result = JobCostService::new(&settings, providers());
    assert!(matches!(
        result,
        Err(ConfigError::Missing { field }) if field == "route.fuel_cost_per_mile"
    ));
}
