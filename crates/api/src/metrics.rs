//! Host metrics fan-out.
//!
//! Every registered host exposes `GET /metrics` on its endpoint. The
//! dashboard asks for all of them at once; [`MetricsFetcher::fetch_all`]
//! queries the hosts in parallel with a per-host timeout and reports each
//! host as `ok` or `error` without failing the whole request.

use futures::future::join_all;
use rollout_core::types::is_local_endpoint;
use rollout_registry::HostEntry;
use serde::Serialize;

use crate::config::MetricsConfig;

/// Errors from a single host's metrics request.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// The host answered with a non-2xx status code.
    #[error("HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Error,
}

/// Metrics of one host, or the reason they could not be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct HostMetrics {
    pub hostname: String,
    pub endpoint: String,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_updates: bool,
}

/// Body of `GET /api/fetch-all-metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct AllMetrics {
    pub hosts: Vec<HostMetrics>,
}

pub struct MetricsFetcher {
    client: reqwest::Client,
    local_addr: String,
}

impl MetricsFetcher {
    /// Build a fetcher whose requests time out after `config.timeout`.
    pub fn new(config: &MetricsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            local_addr: config.local_addr.clone(),
        })
    }

    /// Metrics URL of `endpoint`.
    pub fn metrics_url(&self, endpoint: &str) -> String {
        let base = if is_local_endpoint(endpoint) {
            self.local_addr.as_str()
        } else {
            endpoint
        };
        let base = base.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}/metrics")
        } else {
            format!("http://{base}/metrics")
        }
    }

    /// Query every host in parallel. Results keep the order of `hosts`.
    pub async fn fetch_all(&self, hosts: &[HostEntry]) -> AllMetrics {
        let started = std::time::Instant::now();
        let results = join_all(hosts.iter().map(|host| self.fetch_host(host))).await;

        let failed = results
            .iter()
            .filter(|r| r.status == FetchStatus::Error)
            .count();
        tracing::debug!(
            hosts = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched host metrics",
        );

        AllMetrics { hosts: results }
    }

    async fn fetch_host(&self, host: &HostEntry) -> HostMetrics {
        let url = self.metrics_url(&host.endpoint);
        let (status, metrics, error) = match self.fetch(&url).await {
            Ok(metrics) => (FetchStatus::Ok, Some(metrics), None),
            Err(e) => {
                tracing::warn!(
                    hostname = %host.hostname,
                    endpoint = %host.endpoint,
                    error = %e,
                    "Failed to fetch host metrics",
                );
                (FetchStatus::Error, None, Some(e.to_string()))
            }
        };

        HostMetrics {
            hostname: host.hostname.clone(),
            endpoint: host.endpoint.clone(),
            status,
            metrics,
            error,
            has_updates: host.has_updates(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<serde_json::Value, MetricsError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MetricsError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
