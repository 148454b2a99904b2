use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::time::TimeSource;

/// One instance's live resource usage. `cpu_fraction` is a fraction of one
/// core; the gateway reports whole percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub instance_index: u32,
    pub cpu_fraction: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    pub sampled_at: OffsetDateTime,
}

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("metrics gateway answered {0}")]
    Api(StatusCode),

    #[error("metrics request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait MetricsSource {
    /// Fetches current samples for a log routing key, forwarding the
    /// caller's credential verbatim. Callers treat any failure as "no
    /// stats", never as a request failure.
    async fn fetch(&self, log_guid: &str, token: &str) -> Result<Vec<ResourceSample>, UsageError>;
}

pub struct HttpMetricsSource {
    client: reqwest::Client,
    base_url: String,
    timesource: Arc<dyn TimeSource + Send + Sync>,
}

impl HttpMetricsSource {
    pub fn new<T>(base_url: &str, timeout: Duration, timesource: T) -> anyhow::Result<Self>
    where
        T: TimeSource + Send + Sync + 'static,
    {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timesource: Arc::new(timesource),
        })
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch(&self, log_guid: &str, token: &str) -> Result<Vec<ResourceSample>, UsageError> {
        let response = self
            .client
            .get(format!("{}/apps/{}/usage", self.base_url, log_guid))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(UsageError::Api(response.status()));
        }

        let usages: Vec<ContainerUsage> = response.json().await?;
        let sampled_at = self.timesource.current_time();
        Ok(usages
            .into_iter()
            .map(|usage| ResourceSample {
                instance_index: usage.instance_index,
                cpu_fraction: usage.cpu_percentage / 100.0,
                memory_bytes: usage.memory_bytes,
                disk_bytes: usage.disk_bytes,
                sampled_at,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ContainerUsage {
    instance_index: u32,
    cpu_percentage: f64,
    memory_bytes: u64,
    disk_bytes: u64,
}
