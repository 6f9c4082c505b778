//! High-level service facade used by the quote and job costing layers.

use crate::catalogue::{CatalogueSnapshot, FamilyPattern};
use crate::config::Settings;
use crate::error::{CatalogueError, ConfigError, RouteError, ValidationError};
use crate::model::{
    Address, AliasMapping, CatalogueEntry, LogisticsResult, ProductLineInput, QuoteBatch,
};
use crate::providers::ProviderSet;
use crate::quote::QuoteLineProcessor;
use crate::route::{RouteCalculator, RouteRequest};

/// Public entry point for costing quotes and job routes.
pub struct JobCostService {
    base: Address,
    families: Vec<FamilyPattern>,
    processor: QuoteLineProcessor,
    router: RouteCalculator,
}

impl JobCostService {
    /// Build the service; every required constant is checked here.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a fee, threshold, formula constant or the base address is
    /// missing or invalid.
    pub fn new(settings: &Settings, providers: ProviderSet) -> Result<Self, ConfigError> {
        let base = settings.base_address()?;
        let processor = QuoteLineProcessor::new(settings.waste_estimator()?);
        let router = RouteCalculator::new(providers, settings.route_config()?)?;

        tracing::debug!(base = %base.postcode, "job cost service ready");

        Ok(Self {
            base,
            families: settings.matching.families.clone(),
            processor,
            router,
        })
    }

    /// The configured depot.
    #[must_use]
    pub fn base(&self) -> &Address {
        &self.base
    }

    /// Build a catalogue snapshot using the configured family patterns.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogueError`] when the catalogue data violates its invariants.
    pub fn catalogue(
        &self,
        entries: Vec<CatalogueEntry>,
        aliases: Vec<AliasMapping>,
    ) -> Result<CatalogueSnapshot, CatalogueError> {
        CatalogueSnapshot::new(entries, aliases, self.families.clone())
    }

    /// Resolve and total the lines of one quote.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a line is malformed.
    pub fn quote(
        &self,
        lines: &[ProductLineInput],
        catalogue: &CatalogueSnapshot,
    ) -> Result<QuoteBatch, ValidationError> {
        self.processor.process_batch(lines, catalogue)
    }

    /// Cost the route of one job from the configured depot.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] when the site is missing.
    pub async fn route(
        &self,
        site: Option<Address>,
        collection: Option<Address>,
    ) -> Result<LogisticsResult, RouteError> {
        self.router
            .compute_route(&self.route_request(site, collection))
            .await
    }

    /// Like [`JobCostService::route`], abandoning the lookups once `cancelled` completes.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Cancelled`] when `cancelled` wins, otherwise as `route`.
    pub async fn route_until<F>(
        &self,
        site: Option<Address>,
        collection: Option<Address>,
        cancelled: F,
    ) -> Result<LogisticsResult, RouteError>
    where
        F: Future<Output = ()>,
    {
        self.router
            .compute_route_until(&self.route_request(site, collection), cancelled)
            .await
    }

    fn route_request(&self, site: Option<Address>, collection: Option<Address>) -> RouteRequest {
        RouteRequest {
            base: Some(self.base.clone()),
            collection,
            site,
        }
    }
}
