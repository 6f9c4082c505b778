//! Traits describing the external distance and zone lookups.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{LegDistance, Postcode, ZoneKind};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to lookup backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The lookup did not answer in time.
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The backend knows both postcodes but has no route between them.
    #[error("No route between {from} and {to}")]
    NoRoute {
        /// Start postcode.
        from: Postcode,
        /// End postcode.
        to: Postcode,
    },
    /// The backend rejected the request.
    #[error("Upstream rejected request: {0}")]
    Upstream(String),
    /// The backend answered with something we cannot use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Road distance lookups between two postcodes.
pub trait DistanceProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Measure the drive from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend fails or cannot route between the postcodes.
    async fn distance(&self, from: &Postcode, to: &Postcode) -> Result<LegDistance, PortError>;
}

#[async_trait]
/// Membership checks for one charging zone.
pub trait ZoneProvider: Send + Sync {
    /// The zone this provider answers for.
    fn zone(&self) -> ZoneKind;

    /// Whether `postcode` lies inside the zone.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend fails.
    async fn contains(&self, postcode: &Postcode) -> Result<bool, PortError>;
}
