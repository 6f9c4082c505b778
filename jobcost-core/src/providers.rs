//! Bundles of injected lookups used by the route calculator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::model::ZoneKind;
use crate::ports::{DistanceProvider, ZoneProvider};

/// One provider per charging zone.
pub struct ZoneProviders {
    congestion: Arc<dyn ZoneProvider>,
    emission: Arc<dyn ZoneProvider>,
}

impl ZoneProviders {
    /// Index the provider list by the zone each answers for.
    ///
    /// Later providers for the same zone replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a zone has no provider.
    pub fn new(providers: Vec<Arc<dyn ZoneProvider>>) -> Result<Self, ConfigError> {
        let mut by_zone: HashMap<ZoneKind, Arc<dyn ZoneProvider>> = providers
            .into_iter()
            .map(|provider| (provider.zone(), provider))
            .collect();

        let congestion = by_zone
            .remove(&ZoneKind::Congestion)
            .ok_or_else(|| ConfigError::missing("providers.zones.congestion"))?;
        let emission = by_zone
            .remove(&ZoneKind::EmissionZone)
            .ok_or_else(|| ConfigError::missing("providers.zones.emission_zone"))?;

        Ok(Self {
            congestion,
            emission,
        })
    }

    /// Provider answering for `zone`.
    #[must_use]
    pub fn get(&self, zone: ZoneKind) -> &dyn ZoneProvider {
        match zone {
            ZoneKind::Congestion => self.congestion.as_ref(),
            ZoneKind::EmissionZone => self.emission.as_ref(),
        }
    }
}

/// Distance and zone lookups handed to the route calculator.
pub struct ProviderSet {
    /// Road distance lookups.
    pub distance: Arc<dyn DistanceProvider>,
    /// Zone membership lookups.
    pub zones: ZoneProviders,
}

impl ProviderSet {
    /// Bundle a distance provider with zone providers.
    #[must_use]
    pub fn new(distance: Arc<dyn DistanceProvider>, zones: ZoneProviders) -> Self {
        Self { distance, zones }
    }
}
