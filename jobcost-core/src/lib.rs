//! Core types and service wiring for jobcost: catalogue matching, waste estimation and
//! route costing for installation quotes.

/// Catalogue snapshot and product text matching.
pub mod catalogue;
/// TOML settings and their promotion into typed configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Domain models shared by all components and providers.
pub mod model;
/// Traits describing the external lookups.
pub mod ports;
/// Bundles of injected lookups.
pub mod providers;
/// Quote line batch processing.
pub mod quote;
/// Route building and costing.
pub mod route;
/// High-level service facade used by clients.
pub mod service;
/// Waste volume estimation.
pub mod waste;

pub use catalogue::{CatalogueSnapshot, FamilyPattern, normalize, resolve};
pub use config::Settings;
pub use error::{CatalogueError, ConfigError, RouteError, ValidationError};
pub use model::*;
pub use ports::*;
pub use providers::{ProviderSet, ZoneProviders};
pub use quote::QuoteLineProcessor;
pub use route::{RouteCalculator, RouteConfig, RouteRequest, ZoneChargePolicy};
pub use service::JobCostService;
pub use waste::{WasteEstimator, WasteFormula, WasteProfile};
