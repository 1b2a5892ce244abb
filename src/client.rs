//! Sensor Server Client
//!
//! HTTP client for the two endpoints a CO2 sensor server exposes:
//! `GET /data` and `GET /health`.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{PayloadError, SensorError, SensorResult};
use crate::measurement::{Co2Payload, Measurement};

/// Outcome of one `GET /data` request that got an answer.
///
/// A non-success status is reported alongside the parse result rather than
/// instead of it; the body is parsed either way.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFetch {
    pub status: u16,
    pub measurements: Result<Vec<Measurement>, PayloadError>,
}

impl DataFetch {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Health of a sensor server as seen by the last check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    /// No check has completed yet
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    /// Healthy iff the body is exactly `ok`
    pub fn from_body(body: &str) -> Self {
        if body == "ok" {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy | HealthStatus::Unknown => write!(f, "Unhealthy"),
        }
    }
}

/// Anything the dashboard can poll for readings and health
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Fetch all readings from `{address}/data`. Fails only when no
    /// response arrives at all.
    async fn fetch_data(&self, address: &str) -> SensorResult<DataFetch>;

    /// Check `{address}/health`. Never fails; errors count as unhealthy.
    async fn check_health(&self, address: &str) -> HealthStatus;
}

/// reqwest-backed sensor server client
#[derive(Clone)]
pub struct SensorClient {
    client: Client,
}

impl SensorClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> SensorResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Join a base address and an endpoint path without doubling the slash
pub fn endpoint(address: &str, path: &str) -> String {
    format!("{}/{}", address.trim_end_matches('/'), path)
}

#[async_trait]
impl SensorSource for SensorClient {
    async fn fetch_data(&self, address: &str) -> SensorResult<DataFetch> {
        let url = endpoint(address, "data");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SensorError::from_reqwest(e, address))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SensorError::from_reqwest(e, address))?;

        let measurements = Co2Payload::from_json(&body).and_then(Co2Payload::into_measurements);

        Ok(DataFetch {
            status,
            measurements,
        })
    }

    async fn check_health(&self, address: &str) -> HealthStatus {
        let url = endpoint(address, "health");

        let body = match self.client.get(&url).send().await {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };

        match body {
            Ok(body) => HealthStatus::from_body(&body),
            Err(e) => {
                tracing::debug!(%url, "Health check failed: {}", e);
                HealthStatus::Unhealthy
            }
        }
    }
}
