//! Prometheus HTTP API client for instant vector queries
//!
//! Talks to `GET /api/v1/query` and only accepts `vector` results; matrix,
//! scalar and string answers are reported as query failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meshgraph_core::{MeshGraphError, PrometheusConfig, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::client::{MetricsQueryClient, Sample};

/// Configuration for the Prometheus client
#[derive(Debug, Clone)]
pub struct PrometheusClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for PrometheusClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl TryFrom<&PrometheusConfig> for PrometheusClientConfig {
    type Error = MeshGraphError;

    fn try_from(config: &PrometheusConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.server.trim_end_matches('/').to_string(),
            timeout: config.query_timeout()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorElement {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[<unix seconds>, "<value>"]`
    value: (f64, String),
}

pub struct PrometheusClient {
    client: Client,
    config: PrometheusClientConfig,
}

impl PrometheusClient {
    pub fn new(config: PrometheusClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MeshGraphError::Network(format!("building HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn decode(expr: &str, status: reqwest::StatusCode, body: &str) -> Result<Vec<Sample>> {
        let response: ApiResponse = serde_json::from_str(body).map_err(|e| {
            MeshGraphError::query(expr, format!("HTTP {}: undecodable body: {}", status, e))
        })?;

        if response.status != "success" {
            return Err(MeshGraphError::query(
                expr,
                format!(
                    "HTTP {}: {}: {}",
                    status,
                    response.error_type.unwrap_or_else(|| "error".to_string()),
                    response.error.unwrap_or_default()
                ),
            ));
        }

        let data = response
            .data
            .ok_or_else(|| MeshGraphError::query(expr, "response carries no data"))?;
        if data.result_type != "vector" {
            return Err(MeshGraphError::UnexpectedResultType(format!(
                "no handling for type {} (query `{}`)",
                data.result_type, expr
            )));
        }

        let elements: Vec<VectorElement> = serde_json::from_value(data.result)?;
        Ok(elements
            .into_iter()
            .map(|e| Sample {
                labels: e.metric,
                value: e.value.1.trim().parse::<f64>().unwrap_or(f64::NAN),
            })
            .collect())
    }
}

#[async_trait]
impl MetricsQueryClient for PrometheusClient {
    async fn instant_query(&self, expr: &str, at: DateTime<Utc>) -> Result<Vec<Sample>> {
        let url = format!("{}/api/v1/query", self.config.base_url);
        let time = at.timestamp().to_string();
        debug!("Executing query {}&time={}", expr, at.format("%Y-%m-%d %H:%M:%S"));

        let response = self
            .client
            .get(&url)
            .query(&[("query", expr), ("time", time.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MeshGraphError::Timeout(format!("query `{}` timed out: {}", expr, e))
                } else {
                    MeshGraphError::Network(format!("{} unreachable: {}", url, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MeshGraphError::Network(format!("reading response body: {}", e)))?;
        trace!("Response {} ({} bytes)", status, body.len());

        Self::decode(expr, status, &body)
    }
}
