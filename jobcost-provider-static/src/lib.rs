//! Offline providers: zone membership by postcode district and distances from a fixed table.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use jobcost_core::{
    error::ValidationError,
    model::{LegDistance, Postcode, ZoneKind},
    ports::{DistanceProvider, PortError, ZoneProvider},
};

/// Districts overlapping the central London congestion charge zone.
pub const LONDON_CONGESTION_DISTRICTS: &[&str] = &[
    "EC1", "EC2", "EC3", "EC4", "WC1", "WC2", "W1", "SW1", "SE1", "N1", "NW1", "E1",
];

/// Inner London postcode areas, all inside the ULEZ. Outer areas straddle the boundary and
/// need explicit districts.
pub const LONDON_ULEZ_AREAS: &[&str] = &["E", "EC", "N", "NW", "SE", "SW", "W", "WC"];

/// Zone membership decided by the outward code of a postcode.
///
/// Entries are either whole areas (`SE`, letters only) or districts (`SE1`, `EC1`). A district
/// entry also covers its lettered sub-districts (`EC1` covers `EC1A`) but not longer numbers
/// (`SE1` does not cover `SE10`).
pub struct DistrictZoneProvider {
    zone: ZoneKind,
    districts: Vec<String>,
}

impl DistrictZoneProvider {
    /// Create a provider for `zone` from a list of areas and districts.
    #[must_use]
    pub fn new<I, S>(zone: ZoneKind, districts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            zone,
            districts: districts
                .into_iter()
                .map(|district| district.as_ref().trim().to_uppercase())
                .filter(|district| !district.is_empty())
                .collect(),
        }
    }

    /// Central London congestion charge zone.
    #[must_use]
    pub fn london_congestion() -> Self {
        Self::new(ZoneKind::Congestion, LONDON_CONGESTION_DISTRICTS)
    }

    /// Inner London ULEZ coverage.
    #[must_use]
    pub fn london_ulez() -> Self {
        Self::new(ZoneKind::EmissionZone, LONDON_ULEZ_AREAS)
    }

    fn covers(&self, outward: &str) -> bool {
        self.districts
            .iter()
            .any(|entry| district_matches(outward, entry))
    }
}

fn district_matches(outward: &str, entry: &str) -> bool {
    let Some(rest) = outward.strip_prefix(entry) else {
        return false;
    };

    if entry.chars().all(|ch| ch.is_ascii_alphabetic()) {
        // Area entry: "E" must not swallow "EC1".
        rest.starts_with(|ch: char| ch.is_ascii_digit())
    } else {
        rest.chars().all(|ch| ch.is_ascii_alphabetic())
    }
}

#[async_trait]
impl ZoneProvider for DistrictZoneProvider {
    fn zone(&self) -> ZoneKind {
        self.zone
    }

    async fn contains(&self, postcode: &Postcode) -> Result<bool, PortError> {
        let inside = self.covers(postcode.outward());
        tracing::trace!(%postcode, zone = %self.zone, inside, "district zone check");
        Ok(inside)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One measured drive between two postcodes, usable in either direction.
pub struct DistanceEntry {
    /// One end.
    pub from: String,
    /// Other end.
    pub to: String,
    /// Road distance in miles.
    pub miles: f64,
    /// Drive time in minutes.
    pub minutes: f64,
}

/// Distances looked up from a fixed table, e.g. for depots serving a handful of regular sites.
pub struct DistanceTable {
    entries: HashMap<(Postcode, Postcode), LegDistance>,
}

impl DistanceTable {
    /// Index the entries in both directions; later entries replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPostcode`] when an entry has a malformed postcode and
    /// [`ValidationError::InvalidMeasurement`] when a distance or time is negative or not finite.
    pub fn new(entries: Vec<DistanceEntry>) -> Result<Self, ValidationError> {
        let mut table = HashMap::with_capacity(entries.len() * 2);
        for entry in entries {
            let from = Postcode::parse(&entry.from)?;
            let to = Postcode::parse(&entry.to)?;
            let usable = |value: f64| value.is_finite() && value >= 0.0;
            if !usable(entry.miles) || !usable(entry.minutes) {
                return Err(ValidationError::InvalidMeasurement {
                    from: entry.from,
                    to: entry.to,
                    miles: entry.miles,
                    minutes: entry.minutes,
                });
            }
            let measured = LegDistance {
                distance_miles: entry.miles,
                duration_minutes: entry.minutes,
            };
            table.insert((to.clone(), from.clone()), measured);
            table.insert((from, to), measured);
        }
        Ok(Self { entries: table })
    }

    /// Number of stored directions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DistanceProvider for DistanceTable {
    fn name(&self) -> &str {
        "table"
    }

    async fn distance(&self, from: &Postcode, to: &Postcode) -> Result<LegDistance, PortError> {
        if from == to {
            return Ok(LegDistance {
                distance_miles: 0.0,
                duration_minutes: 0.0,
            });
        }

        self.entries
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or_else(|| PortError::NoRoute {
                from: from.clone(),
                to: to.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postcode(raw: &str) -> Postcode {
        Postcode::parse(raw).expect("valid postcode")
    }

    #[tokio::test]
    async fn congestion_districts_cover_sub_districts_only() {
        let zone = DistrictZoneProvider::london_congestion();

        for inside in ["EC1A 1BB", "SE1 3ER", "W1K 1AA", "SW1A 2AA"] {
            assert!(
                zone.contains(&postcode(inside)).await.expect("lookup"),
                "{inside} should be inside"
            );
        }
        for outside in ["SE10 9NN", "W10 5AA", "B1 1RS", "E14 5AB"] {
            assert!(
                !zone.contains(&postcode(outside)).await.expect("lookup"),
                "{outside} should be outside"
            );
        }
    }

    #[tokio::test]
    async fn area_entries_do_not_swallow_longer_areas() {
        let zone = DistrictZoneProvider::new(ZoneKind::EmissionZone, ["e"]);

        assert!(zone.contains(&postcode("E14 5AB")).await.expect("lookup"));
        assert!(!zone.contains(&postcode("EC1A 1BB")).await.expect("lookup"));
        assert!(!zone.contains(&postcode("EN1 1AA")).await.expect("lookup"));
        assert_eq!(zone.zone(), ZoneKind::EmissionZone);
    }

    #[tokio::test]
    async fn table_lookup_is_symmetric() {
        let table = DistanceTable::new(vec![DistanceEntry {
            from: "se1 4aa".to_owned(),
            to: "B1 1RS".to_owned(),
            miles: 120.0,
            minutes: 150.0,
        }])
        .expect("valid table");

        let there = table
            .distance(&postcode("SE1 4AA"), &postcode("B1 1RS"))
            .await
            .expect("forward");
        let back = table
            .distance(&postcode("B1 1RS"), &postcode("SE1 4AA"))
            .await
            .expect("backward");
        assert_eq!(there, back);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn unknown_pair_is_no_route() {
        let table = DistanceTable::new(Vec::new()).expect("empty table");
        let result = table
            .distance(&postcode("SE1 4AA"), &postcode("B1 1RS"))
            .await;
        assert!(matches!(result, Err(PortError::NoRoute { .. })));

        let same = table
            .distance(&postcode("SE1 4AA"), &postcode("SE1 4AA"))
            .await
            .expect("same place");
        assert!(same.distance_miles.abs() < f64::EPSILON);
    }

    #[test]
    fn negative_or_missing_measurement_is_rejected() {
        let entry = |miles: f64, minutes: f64| DistanceEntry {
            from: "SE1 4AA".to_owned(),
            to: "B1 1RS".to_owned(),
            miles,
            minutes,
        };

        for (miles, minutes) in [(-120.0, 150.0), (120.0, f64::NAN), (f64::INFINITY, 1.0)] {
            let result = DistanceTable::new(vec![entry(miles, minutes)]);
            assert!(
                matches!(result, Err(ValidationError::InvalidMeasurement { .. })),
                "{miles} miles / {minutes} minutes should be rejected"
            );
        }
        assert!(DistanceTable::new(vec![entry(0.0, 0.0)]).is_ok());
    }

    #[test]
    fn malformed_postcode_is_rejected() {
        let result = DistanceTable::new(vec![DistanceEntry {
            from: "nowhere".to_owned(),
            to: "B1 1RS".to_owned(),
            miles: 1.0,
            minutes: 1.0,
        }]);
        assert!(result.is_err());
    }
}
