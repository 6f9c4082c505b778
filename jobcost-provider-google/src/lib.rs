//! Distance provider using the Google Distance Matrix API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use jobcost_core::{
    model::{LegDistance, Postcode},
    ports::{DistanceProvider, PortError},
};

const BASE_URL: &str = "https://maps.googleapis.com";
const MATRIX_PATH: &str = "/maps/api/distancematrix/json";

const METRES_PER_MILE: f64 = 1_609.344;
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Response from /maps/api/distancematrix/json
#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

/// One origin/destination cell.
#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String, // "OK", "NOT_FOUND", "ZERO_RESULTS", ...
    distance: Option<ValueField>,
    duration: Option<ValueField>,
}

/// `{ "text": "12.3 mi", "value": 19795 }`; value is metres or seconds.
#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

/// Road distances from the Distance Matrix API, one origin and destination per request.
pub struct GoogleDistanceProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleDistanceProvider {
    /// Create a provider bound to the given HTTP client and API key.
    #[must_use]
    pub fn new<K: Into<String>>(client: Client, api_key: K) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_owned(),
        }
    }

    /// Send requests to another host, e.g. a proxy or a test server.
    #[must_use]
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

#[async_trait]
impl DistanceProvider for GoogleDistanceProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn distance(&self, from: &Postcode, to: &Postcode) -> Result<LegDistance, PortError> {
        // Postcodes alone are ambiguous for the geocoder outside the UK.
        let origin = format!("{from}, UK");
        let destination = format!("{to}, UK");

        let req = self
            .client
            .get(format!("{}{MATRIX_PATH}", self.base_url))
            .query(&[
                ("origins", origin.as_str()),
                ("destinations", destination.as_str()),
                ("units", "imperial"),
                ("mode", "driving"),
                ("region", "uk"),
                ("key", self.api_key.as_str()),
            ]);

        let matrix = fetch_json::<MatrixResponse>(req).await?;

        if matrix.status != "OK" {
            let detail = matrix.error_message.unwrap_or_default();
            return Err(PortError::Upstream(format!("{} {detail}", matrix.status)
                .trim_end()
                .to_owned()));
        }

        let element = matrix
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| PortError::InvalidResponse("empty distance matrix".into()))?;

        match element.status.as_str() {
            "OK" => {}
            "NOT_FOUND" | "ZERO_RESULTS" => {
                return Err(PortError::NoRoute {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            other => {
                return Err(PortError::Upstream(format!("element status {other}")));
            }
        }

        let (Some(distance), Some(duration)) = (element.distance, element.duration) else {
            return Err(PortError::InvalidResponse(
                "element without distance or duration".into(),
            ));
        };

        let measured = LegDistance {
            distance_miles: distance.value / METRES_PER_MILE,
            duration_minutes: duration.value / SECONDS_PER_MINUTE,
        };
        tracing::debug!(
            %from,
            %to,
            miles = measured.distance_miles,
            minutes = measured.duration_minutes,
            "distance matrix answered"
        );
        Ok(measured)
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn postcode(raw: &str) -> Postcode {
        Postcode::parse(raw).expect("valid postcode")
    }

    fn provider(server: &MockServer) -> GoogleDistanceProvider {
        GoogleDistanceProvider::new(Client::new(), "test-key").with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn converts_metres_and_seconds() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(MATRIX_PATH)
                    .query_param("origins", "SE1 4AA, UK")
                    .query_param("destinations", "B1 1RS, UK")
                    .query_param("key", "test-key");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        r#"{"status":"OK","rows":[{"elements":[{"status":"OK",
                            "distance":{"text":"100 mi","value":160934.4},
                            "duration":{"text":"2 hours","value":7200}}]}]}"#,
                    );
            })
            .await;

        let measured = provider(&server)
            .distance(&postcode("SE1 4AA"), &postcode("B1 1RS"))
            .await
            .expect("distance");

        mock.assert_async().await;
        assert!((measured.distance_miles - 100.0).abs() < 1e-9);
        assert!((measured.duration_minutes - 120.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_results_is_no_route() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(MATRIX_PATH);
                then.status(200).body(
                    r#"{"status":"OK","rows":[{"elements":[{"status":"ZERO_RESULTS"}]}]}"#,
                );
            })
            .await;

        let result = provider(&server)
            .distance(&postcode("SE1 4AA"), &postcode("BT1 1AA"))
            .await;

        assert!(matches!(result, Err(PortError::NoRoute { .. })));
    }

    #[tokio::test]
    async fn denied_request_is_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(MATRIX_PATH);
                then.status(200).body(
                    r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid.","rows":[]}"#,
                );
            })
            .await;

        let result = provider(&server)
            .distance(&postcode("SE1 4AA"), &postcode("B1 1RS"))
            .await;

        match result {
            Err(PortError::Upstream(message)) => {
                assert_eq!(message, "REQUEST_DENIED The provided API key is invalid.");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_failure_is_network_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(MATRIX_PATH);
                then.status(503);
            })
            .await;

        let result = provider(&server)
            .distance(&postcode("SE1 4AA"), &postcode("B1 1RS"))
            .await;

        assert!(matches!(result, Err(PortError::Network(_))));
    }
}
